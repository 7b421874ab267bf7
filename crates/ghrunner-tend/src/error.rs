//! Error types for the tend loop and job lifecycles.

use thiserror::Error;

use ghrunner_core::{CoreError, InstanceName, JobKey, PollError};
use ghrunner_github::PlatformError;
use ghrunner_provider::ProviderError;

use crate::config::ConfigError;

/// Errors that end a job lifecycle or a tend session.
#[derive(Debug, Error)]
pub enum TendError {
    /// A label or id lookup came back empty.
    #[error("operation '{operation}' on {resource}: resource not found")]
    ResourceNotFound { operation: String, resource: String },

    /// A label lookup matched more than one runner.
    #[error("operation '{operation}' on {resource}: matched {count} runners")]
    AmbiguousMatch {
        operation: String,
        resource: String,
        count: usize,
    },

    /// A bounded wait ran out of attempts.
    #[error("timeout while executing operation '{operation}' on {resource} after {attempts} attempts")]
    OperationTimeout {
        operation: String,
        resource: String,
        attempts: u32,
    },

    /// Minting the runner registration token failed.
    #[error("could not mint a registration token: {0}")]
    CredentialMint(#[source] PlatformError),

    /// Instance creation failed on every attempt.
    #[error("could not create instance {instance} after {attempts} attempts: {source}")]
    InstanceCreate {
        instance: InstanceName,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Instance destruction failed on every attempt.
    #[error("could not destroy instance {instance} after {attempts} attempts: {source}")]
    InstanceDestroy {
        instance: InstanceName,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A tracked job reached `failed`.
    #[error("job {} of run {} failed: {reason}", key.job_name(), key.run_id())]
    JobFailed { key: JobKey, reason: String },

    /// A probe failed with an unexpected CI-platform error.
    #[error("operation '{operation}' on {resource} failed: {source}")]
    Probe {
        operation: String,
        resource: String,
        #[source]
        source: PlatformError,
    },

    /// CI-platform call failed outside a wait.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Tracking table rejected an update.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TendError {
    /// Classify a platform error raised while looking up `resource`.
    pub(crate) fn lookup(operation: &str, resource: &str, source: PlatformError) -> Self {
        match source {
            PlatformError::NotFound(_) => Self::ResourceNotFound {
                operation: operation.to_string(),
                resource: resource.to_string(),
            },
            PlatformError::Ambiguous { count, .. } => Self::AmbiguousMatch {
                operation: operation.to_string(),
                resource: resource.to_string(),
                count,
            },
            source => Self::Probe {
                operation: operation.to_string(),
                resource: resource.to_string(),
                source,
            },
        }
    }
}

impl From<PollError<PlatformError>> for TendError {
    fn from(e: PollError<PlatformError>) -> Self {
        match e {
            PollError::Timeout {
                operation,
                resource,
                attempts,
            } => Self::OperationTimeout {
                operation,
                resource,
                attempts,
            },
            PollError::Fatal {
                operation,
                resource,
                source,
            } => Self::lookup(&operation, &resource, source),
        }
    }
}
