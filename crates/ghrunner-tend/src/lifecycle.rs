//! Lifecycle of a single job: mint, create, wait, destroy.

use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use ghrunner_core::{InstanceName, JobKey, JobStatus};
use ghrunner_provider::{Provider, ProviderError};

use crate::error::TendError;
use crate::runner_wait::{wait_for_runner_to_be_deregistered, wait_for_runner_to_become_active};
use crate::table::JobTable;
use crate::tend::Session;

/// Drives one tracked job from `queued` to `finished` or `failed`.
///
/// Owns its provider and is the only writer of its table entry.
pub struct JobLifecycle {
    key: JobKey,
    provider: Box<dyn Provider>,
    session: Session,
    table: JobTable,
    max_retry: u32,
}

impl JobLifecycle {
    /// Create a lifecycle for a job already inserted in `table`.
    pub fn new(
        key: JobKey,
        provider: Box<dyn Provider>,
        session: Session,
        table: JobTable,
        max_retry: u32,
    ) -> Self {
        Self {
            key,
            provider,
            session,
            table,
            max_retry: max_retry.max(1),
        }
    }

    /// Run the lifecycle to a terminal status.
    ///
    /// The outcome is also written to the table; an error here means the job
    /// is now `failed`.
    pub async fn run(mut self) -> Result<(), TendError> {
        let key = self.key.clone();
        let instance = match self.start().await {
            Ok(instance) => instance,
            Err(e) => {
                return self
                    .settle(Err(e))
                    .instrument(info_span!("job", job = %key))
                    .await;
            }
        };

        let span = info_span!("job", job = %key, instance = %instance);
        async move {
            info!(provider = self.provider.kind(), "Starting job lifecycle");
            let outcome = self.drive(&instance).await;
            self.settle(outcome).await
        }
        .instrument(span)
        .await
    }

    async fn start(&self) -> Result<InstanceName, TendError> {
        self.table.transition(&self.key, JobStatus::Running).await?;
        Ok(self.table.assign_instance(&self.key).await?)
    }

    async fn settle(&self, outcome: Result<(), TendError>) -> Result<(), TendError> {
        match outcome {
            Ok(()) => {
                self.table.transition(&self.key, JobStatus::Finished).await?;
                info!("Job finished");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Job failed");
                if let Err(record) = self.table.fail(&self.key, e.to_string()).await {
                    warn!(error = %record, "Could not record job failure");
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, instance: &InstanceName) -> Result<(), TendError> {
        let platform = self.session.platform.clone();
        let timings = self.session.timings;

        if self.provider.wants_registration_token() {
            let token = platform
                .mint_registration_token()
                .await
                .map_err(TendError::CredentialMint)?;
            self.provider.with_registration_token(token);
            debug!("Registration token injected");
        }

        if let Err((attempts, source)) = self.create(instance).await {
            warn!(error = %source, "Create retries exhausted, attempting teardown");
            match self.provider.destroy_instance(instance).await {
                Ok(()) => info!("Teardown after failed creation succeeded"),
                Err(e) => warn!(error = %e, "Teardown after failed creation failed"),
            }
            return Err(TendError::InstanceCreate {
                instance: instance.clone(),
                attempts,
                source,
            });
        }

        if self.provider.wants_registration_token() {
            wait_for_runner_to_become_active(platform.as_ref(), instance.as_str(), &timings)
                .await?;
        }

        if self.provider.wants_registration_token() {
            wait_for_runner_to_be_deregistered(
                platform.as_ref(),
                instance.as_str(),
                timings.deregister,
            )
            .await?;
        }

        self.destroy(instance)
            .await
            .map_err(|(attempts, source)| TendError::InstanceDestroy {
                instance: instance.clone(),
                attempts,
                source,
            })
    }

    async fn create(&self, instance: &InstanceName) -> Result<(), (u32, ProviderError)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.create_instance(instance).await {
                Ok(()) => {
                    info!(attempt, "Instance created");
                    return Ok(());
                }
                Err(e) if attempt >= self.max_retry => return Err((attempt, e)),
                Err(e) => {
                    warn!(attempt, max_retry = self.max_retry, error = %e, "Failed to create instance, retrying");
                    sleep(self.session.timings.retry_delay).await;
                }
            }
        }
    }

    async fn destroy(&self, instance: &InstanceName) -> Result<(), (u32, ProviderError)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.destroy_instance(instance).await {
                Ok(()) => {
                    info!(attempt, "Instance destroyed");
                    return Ok(());
                }
                Err(e) if attempt >= self.max_retry => return Err((attempt, e)),
                Err(e) => {
                    warn!(attempt, max_retry = self.max_retry, error = %e, "Failed to destroy instance, retrying");
                    sleep(self.session.timings.retry_delay).await;
                }
            }
        }
    }
}
