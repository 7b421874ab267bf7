//! Tracked job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, InstanceName, JobKey, JobStatus};

/// Default number of create/destroy attempts per job.
pub const DEFAULT_MAX_RETRY: u32 = 2;

/// The controller's own bookkeeping for one (run, job) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedJob {
    /// Composite key of the job.
    pub key: JobKey,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Maximum attempts for the create and destroy steps.
    pub max_retry: u32,

    /// Label that selected the runner type.
    pub label: String,

    /// Instance serving the job, once named.
    pub instance: Option<InstanceName>,

    /// When the job was first observed.
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,

    /// Error message if the job failed.
    pub error_message: Option<String>,
}

impl TrackedJob {
    /// Create a new TrackedJob in `queued` status.
    pub fn new(key: JobKey, label: impl Into<String>) -> Self {
        Self {
            key,
            status: JobStatus::Queued,
            max_retry: DEFAULT_MAX_RETRY,
            label: label.into(),
            instance: None,
            created_at: Utc::now(),
            finished_at: None,
            error_message: None,
        }
    }

    /// Builder method to set the retry count.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Move to `next`, rejecting any transition that is not forward.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
