//! Shared tracking table.
//!
//! The tend loop inserts entries and scans them; each job lifecycle writes
//! only its own entry. Every access goes through one lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use ghrunner_core::{CoreError, InstanceName, JobKey, JobStatus, TrackedJob};

#[derive(Default)]
struct Entries {
    jobs: HashMap<JobKey, TrackedJob>,
    instances: HashSet<InstanceName>,
}

/// Tracked jobs of one tend session, keyed by run and job name.
#[derive(Clone, Default)]
pub struct JobTable {
    inner: Arc<RwLock<Entries>>,
}

impl JobTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `job` unless its key is already tracked. Returns whether it was inserted.
    pub async fn insert_if_absent(&self, job: TrackedJob) -> bool {
        let mut entries = self.inner.write().await;
        if entries.jobs.contains_key(&job.key) {
            return false;
        }
        entries.jobs.insert(job.key.clone(), job);
        true
    }

    /// Get a copy of a tracked job.
    pub async fn get(&self, key: &JobKey) -> Option<TrackedJob> {
        self.inner.read().await.jobs.get(key).cloned()
    }

    /// Current status of a tracked job.
    pub async fn status(&self, key: &JobKey) -> Option<JobStatus> {
        self.inner.read().await.jobs.get(key).map(|job| job.status)
    }

    /// Move a job forward. Rejects any transition out of a terminal status.
    pub async fn transition(&self, key: &JobKey, next: JobStatus) -> Result<(), CoreError> {
        let mut entries = self.inner.write().await;
        entries
            .jobs
            .get_mut(key)
            .ok_or_else(|| CoreError::JobNotFound(key.to_string()))?
            .transition(next)
    }

    /// Mark a job failed with a reason.
    pub async fn fail(&self, key: &JobKey, reason: impl Into<String>) -> Result<(), CoreError> {
        let mut entries = self.inner.write().await;
        entries
            .jobs
            .get_mut(key)
            .ok_or_else(|| CoreError::JobNotFound(key.to_string()))?
            .fail(reason)
    }

    /// Generate an instance name for `key` that was never handed out before
    /// in this session, and record it on the job.
    pub async fn assign_instance(&self, key: &JobKey) -> Result<InstanceName, CoreError> {
        let mut entries = self.inner.write().await;
        if !entries.jobs.contains_key(key) {
            return Err(CoreError::JobNotFound(key.to_string()));
        }

        let name = loop {
            let candidate = InstanceName::generate(key.run_id());
            if entries.instances.insert(candidate.clone()) {
                break candidate;
            }
        };

        if let Some(job) = entries.jobs.get_mut(key) {
            job.instance = Some(name.clone());
        }
        Ok(name)
    }

    /// First tracked job found in `failed` status.
    pub async fn first_failed(&self) -> Option<TrackedJob> {
        self.inner
            .read()
            .await
            .jobs
            .values()
            .find(|job| job.status == JobStatus::Failed)
            .cloned()
    }

    /// Whether every tracked job is `finished`. True for an empty table.
    pub async fn all_finished(&self) -> bool {
        self.inner
            .read()
            .await
            .jobs
            .values()
            .all(|job| job.status == JobStatus::Finished)
    }

    /// Copy of every tracked job.
    pub async fn snapshot(&self) -> Vec<TrackedJob> {
        self.inner.read().await.jobs.values().cloned().collect()
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    /// Whether no job is tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.jobs.is_empty()
    }
}
