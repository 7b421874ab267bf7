//! Bounded-retry state poller.
//!
//! [`await_condition`] repeatedly probes an external resource until a
//! predicate holds, sleeping a fixed interval between attempts. It never
//! probes more than [`PollBudget::attempts`] times and never backs off, so
//! the worst-case wall-clock time of a wait is known up front.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Attempt count and fixed spacing of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    /// Maximum number of probe calls.
    pub attempts: u32,

    /// Sleep between two probe calls.
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
}

impl PollBudget {
    /// Create a new budget.
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// How the poller treats a probe error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Resource not visible yet: sleep and probe again.
    Retry,
    /// The error is the awaited outcome (e.g. the resource is gone).
    Accept,
    /// Unexpected: stop immediately.
    Abort,
}

/// Outcome of a successful wait.
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence<T> {
    /// The probe returned a value satisfying the predicate.
    Reached(T),
    /// A probe error was accepted as the outcome.
    Gone,
}

impl<T> Convergence<T> {
    /// The satisfying value, if the wait ended on one.
    pub fn into_reached(self) -> Option<T> {
        match self {
            Self::Reached(value) => Some(value),
            Self::Gone => None,
        }
    }
}

/// Errors returned by [`await_condition`].
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The budget ran out before the condition held.
    #[error("timeout while executing operation '{operation}' on {resource} after {attempts} attempts")]
    Timeout {
        operation: String,
        resource: String,
        attempts: u32,
    },

    /// A probe failed with an error classified as fatal.
    #[error("operation '{operation}' on {resource} failed: {source}")]
    Fatal {
        operation: String,
        resource: String,
        #[source]
        source: E,
    },
}

impl<E> PollError<E> {
    /// Name of the operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::Timeout { operation, .. } | Self::Fatal { operation, .. } => operation,
        }
    }

    /// Resource the operation targeted.
    pub fn resource(&self) -> &str {
        match self {
            Self::Timeout { resource, .. } | Self::Fatal { resource, .. } => resource,
        }
    }
}

/// Wait until `is_satisfied` holds for the probed resource.
///
/// - `probe` fetches the current external state.
/// - `is_satisfied` tests a successful probe result.
/// - `classify` decides what a probe error means, see [`ErrorAction`].
///
/// `operation` and `resource` label the returned errors and log lines.
pub async fn await_condition<T, E, P, Fut, S, C>(
    operation: &str,
    resource: &str,
    budget: PollBudget,
    mut probe: P,
    is_satisfied: S,
    classify: C,
) -> Result<Convergence<T>, PollError<E>>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(&T) -> bool,
    C: Fn(&E) -> ErrorAction,
    E: fmt::Display,
{
    debug!(operation, resource, attempts = budget.attempts, "Waiting for condition");

    for attempt in 1..=budget.attempts {
        match probe().await {
            Ok(value) if is_satisfied(&value) => {
                debug!(operation, resource, attempt, "Condition reached");
                return Ok(Convergence::Reached(value));
            }
            Ok(_) => {
                debug!(operation, resource, attempt, "Condition not reached yet");
            }
            Err(e) => match classify(&e) {
                ErrorAction::Retry => {
                    debug!(operation, resource, attempt, error = %e, "Resource not visible yet");
                }
                ErrorAction::Accept => {
                    debug!(operation, resource, attempt, error = %e, "Probe error accepted as outcome");
                    return Ok(Convergence::Gone);
                }
                ErrorAction::Abort => {
                    return Err(PollError::Fatal {
                        operation: operation.to_string(),
                        resource: resource.to_string(),
                        source: e,
                    });
                }
            },
        }

        if attempt < budget.attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }

    Err(PollError::Timeout {
        operation: operation.to_string(),
        resource: resource.to_string(),
        attempts: budget.attempts,
    })
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
