//! ghrunner Core Domain Types
//!
//! This crate contains the domain types shared by every ghrunner crate:
//! - identifiers for CI runs, runners, tracked jobs and instances
//! - status enums and the tracked-job state machine
//! - read-only views of CI runs, jobs and registered runners
//! - the bounded-retry state poller used to wait on remote state
//!
//! Nothing here talks to the network; the poller only sleeps between probes.

pub mod error;
pub mod ids;
pub mod job;
pub mod model;
pub mod poll;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{InstanceName, JobKey, RegistrationToken, RunId, RunnerId};
pub use job::TrackedJob;
pub use model::{CiJob, CiRun, Repository, Runner};
pub use poll::{await_condition, Convergence, ErrorAction, PollBudget, PollError};
pub use status::{CiStatus, JobStatus};
