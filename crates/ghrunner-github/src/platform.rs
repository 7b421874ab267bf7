//! The CI-platform operations consumed by the tend loop.

use async_trait::async_trait;

use ghrunner_core::{CiJob, CiRun, RegistrationToken, RunId, Runner, RunnerId};

use crate::error::PlatformError;

/// Operations the controller needs from the CI platform.
///
/// Runner registration is asynchronous on the platform side, so callers
/// poll these operations rather than expecting immediate consistency.
#[async_trait]
pub trait CiPlatform: Send + Sync {
    /// Fetch a run by id.
    async fn get_run(&self, run_id: RunId) -> Result<CiRun, PlatformError>;

    /// List the jobs of `run` that are currently queued.
    async fn queued_jobs(&self, run: &CiRun) -> Result<Vec<CiJob>, PlatformError>;

    /// Mint a short-lived runner registration token.
    async fn mint_registration_token(&self) -> Result<RegistrationToken, PlatformError>;

    /// List every registered runner carrying `label`.
    async fn find_runners_by_label(&self, label: &str) -> Result<Vec<Runner>, PlatformError>;

    /// Fetch a runner by id. A missing runner is [`PlatformError::NotFound`].
    async fn get_runner(&self, id: RunnerId) -> Result<Runner, PlatformError>;

    /// Remove a runner registration.
    async fn remove_runner(&self, id: RunnerId) -> Result<(), PlatformError>;

    /// Find exactly one runner carrying `label`.
    ///
    /// No match is [`PlatformError::NotFound`], more than one match is
    /// [`PlatformError::Ambiguous`].
    async fn find_one_runner_by_label(&self, label: &str) -> Result<Runner, PlatformError> {
        let mut runners = self.find_runners_by_label(label).await?;
        match runners.len() {
            0 => Err(PlatformError::NotFound(format!("runner labeled {label:?}"))),
            1 => Ok(runners.remove(0)),
            count => Err(PlatformError::Ambiguous {
                label: label.to_string(),
                count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghrunner_core::CiStatus;

    struct StaticRunners(Vec<Runner>);

    #[async_trait]
    impl CiPlatform for StaticRunners {
        async fn get_run(&self, run_id: RunId) -> Result<CiRun, PlatformError> {
            Ok(CiRun::new(run_id, CiStatus::InProgress))
        }

        async fn queued_jobs(&self, _run: &CiRun) -> Result<Vec<CiJob>, PlatformError> {
            Ok(Vec::new())
        }

        async fn mint_registration_token(&self) -> Result<RegistrationToken, PlatformError> {
            Ok(RegistrationToken::new("token"))
        }

        async fn find_runners_by_label(&self, label: &str) -> Result<Vec<Runner>, PlatformError> {
            Ok(self.0.iter().filter(|r| r.has_label(label)).cloned().collect())
        }

        async fn get_runner(&self, id: RunnerId) -> Result<Runner, PlatformError> {
            Err(PlatformError::NotFound(format!("runner {id}")))
        }

        async fn remove_runner(&self, _id: RunnerId) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_find_one_runner_by_label() {
        let platform = StaticRunners(vec![
            Runner::new(RunnerId::new(1), "a").with_label("alpha"),
            Runner::new(RunnerId::new(2), "b").with_label("beta"),
            Runner::new(RunnerId::new(3), "c").with_label("beta"),
        ]);

        let runner = platform.find_one_runner_by_label("alpha").await.unwrap();
        assert_eq!(runner.id, RunnerId::new(1));

        let err = platform.find_one_runner_by_label("gamma").await.unwrap_err();
        assert!(err.is_not_found());

        let err = platform.find_one_runner_by_label("beta").await.unwrap_err();
        assert!(matches!(err, PlatformError::Ambiguous { count: 2, .. }));
    }
}
