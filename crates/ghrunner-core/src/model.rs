//! Read-only views of CI-platform objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CiStatus, RunId, RunnerId};

/// Repository the runners are registered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    /// Owner (user or organisation).
    pub owner: String,

    /// Repository name.
    pub name: String,
}

impl Repository {
    /// Create a new Repository.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A CI (workflow) run, refreshed on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiRun {
    /// Run identifier.
    pub id: RunId,

    /// Current run status.
    pub status: CiStatus,
}

impl CiRun {
    /// Create a new CiRun.
    pub fn new(id: RunId, status: CiStatus) -> Self {
        Self { id, status }
    }

    /// Returns true once the run is completed.
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// A job of a CI run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiJob {
    /// Job identifier, unique within the run.
    pub id: u64,

    /// Human job name.
    pub name: String,

    /// Current job status.
    pub status: CiStatus,

    /// Labels requested by the job, in declared order.
    pub labels: Vec<String>,
}

impl CiJob {
    /// Create a new queued job.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: CiStatus::Queued,
            labels: Vec::new(),
        }
    }

    /// Builder method to add a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: CiStatus) -> Self {
        self.status = status;
        self
    }
}

/// A self-hosted runner registered with the CI platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// Runner identifier.
    pub id: RunnerId,

    /// Runner name.
    pub name: String,

    /// Connection status as reported by the platform (`online`, `offline`, ...).
    pub status: String,

    /// Runner labels.
    pub labels: Vec<String>,
}

impl Runner {
    /// Status the platform reports before a runner connects.
    pub const OFFLINE: &'static str = "offline";

    /// Create a new offline runner.
    pub fn new(id: RunnerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: Self::OFFLINE.to_string(),
            labels: Vec::new(),
        }
    }

    /// Builder method to add a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Check whether the runner carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
