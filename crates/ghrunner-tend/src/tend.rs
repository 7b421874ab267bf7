//! The tend loop.
//!
//! Polls one CI run for queued jobs, starts a [`JobLifecycle`] per newly seen
//! job, and once the run is completed waits for every tracked job to settle.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use ghrunner_core::{JobKey, JobStatus, RunId, TrackedJob};
use ghrunner_github::CiPlatform;

use crate::config::{RunnerConfig, Timings};
use crate::error::TendError;
use crate::lifecycle::JobLifecycle;
use crate::table::JobTable;

/// Collaborators and timings shared by the loop and every lifecycle.
#[derive(Clone)]
pub struct Session {
    /// CI platform the run lives on.
    pub platform: Arc<dyn CiPlatform>,

    /// Sleeps, retry counts and wait budgets.
    pub timings: Timings,
}

impl Session {
    /// Create a new session.
    pub fn new(platform: Arc<dyn CiPlatform>, timings: Timings) -> Self {
        Self { platform, timings }
    }
}

/// Tend run `run_id` until it completes and every job it spawned has finished.
///
/// Returns an error as soon as a tracked job is seen `failed`; lifecycles
/// already started keep running in the background.
pub async fn tend(session: &Session, run_id: RunId, config: &RunnerConfig) -> Result<(), TendError> {
    tend_with_table(session, run_id, config, &JobTable::new()).await
}

pub(crate) async fn tend_with_table(
    session: &Session,
    run_id: RunId,
    config: &RunnerConfig,
    table: &JobTable,
) -> Result<(), TendError> {
    let timings = session.timings;
    let mut run = session.platform.get_run(run_id).await?;
    info!(run_id = %run.id, status = ?run.status, "Tending workflow run");

    while !run.is_completed() {
        run = session.platform.get_run(run_id).await?;

        let jobs = session.platform.queued_jobs(&run).await?;
        if jobs.is_empty() {
            debug!(run_id = %run.id, "No queued jobs");
            sleep(timings.idle_poll).await;
            continue;
        }

        for job in jobs {
            let key = JobKey::new(run.id, job.name.as_str());

            if let Some(status) = table.status(&key).await {
                if status == JobStatus::Failed {
                    return Err(job_failed(table, key).await);
                }
                debug!(job = %key, status = %status, "Job already handled");
                continue;
            }

            let Some(runner) = config.runner_for_labels(&job.labels) else {
                warn!(job = %key, labels = ?job.labels, "No runner configured for job labels, skipping");
                continue;
            };

            let mut provider = runner.provider.clone_box();
            provider.with_runner_label(&runner.label);

            let tracked = TrackedJob::new(key.clone(), runner.label.as_str())
                .with_max_retry(timings.max_retry);
            if !table.insert_if_absent(tracked).await {
                continue;
            }

            info!(job = %key, label = %runner.label, provider = provider.kind(), "Launching job lifecycle");
            let lifecycle = JobLifecycle::new(
                key,
                provider,
                session.clone(),
                table.clone(),
                timings.max_retry,
            );
            tokio::spawn(lifecycle.run());
        }

        sleep(timings.tick).await;
    }

    let tracked = table.len().await;
    info!(run_id = %run.id, tracked, "Run completed, waiting for jobs to settle");
    loop {
        if let Some(failed) = table.first_failed().await {
            return Err(job_failed(table, failed.key).await);
        }
        if table.all_finished().await {
            info!(run_id = %run.id, "All jobs finished");
            return Ok(());
        }
        sleep(timings.drain_poll).await;
    }
}

async fn job_failed(table: &JobTable, key: JobKey) -> TendError {
    let reason = table
        .get(&key)
        .await
        .and_then(|job| job.error_message)
        .unwrap_or_else(|| "unknown error".to_string());
    TendError::JobFailed { key, reason }
}
