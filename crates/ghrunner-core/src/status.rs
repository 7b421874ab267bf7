//! Status enums for CI runs/jobs and tracked jobs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the CI platform for a run or a job.
///
/// The tend loop only distinguishes `Completed` from everything else for
/// runs, and `Queued` from everything else for jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    /// Waiting for a runner.
    #[default]
    Queued,
    /// Executing.
    InProgress,
    /// Done, whatever the conclusion.
    Completed,
    /// Waiting on an environment protection rule.
    Waiting,
    /// Requested but not yet queued.
    Requested,
    /// Pending on a concurrency group.
    Pending,
    /// Any status this client does not know.
    #[serde(other)]
    Unknown,
}

impl CiStatus {
    /// Returns true once the CI platform reports the run/job as done.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true while the job waits for a runner.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Provisioning status of a tracked job.
///
/// Moves strictly along `Queued -> Running -> {Finished | Failed}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Tracked, lifecycle not started yet.
    #[default]
    Queued,
    /// Lifecycle is provisioning or waiting on the instance.
    Running,
    /// Lifecycle gave up.
    Failed,
    /// Instance served its job and was destroyed.
    Finished,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Queued, Self::Running) => true,
            // A lifecycle may fail before it ever reaches running.
            (Self::Queued, Self::Failed) => true,
            (Self::Running, Self::Finished | Self::Failed) => true,
            _ => false,
        }
    }

    /// Wire/log name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_successor() {
        for from in [JobStatus::Finished, JobStatus::Failed] {
            for to in [
                JobStatus::Queued,
                JobStatus::Running,
                JobStatus::Failed,
                JobStatus::Finished,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Finished));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Finished));
    }

    #[test]
    fn test_ci_status_decodes_unknown() {
        let status: CiStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, CiStatus::InProgress);

        let status: CiStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, CiStatus::Unknown);
    }
}
