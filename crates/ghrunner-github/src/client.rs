//! GitHub REST client implementing [`CiPlatform`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use ghrunner_core::{CiJob, CiRun, RegistrationToken, Repository, RunId, Runner, RunnerId};

use crate::error::PlatformError;
use crate::platform::CiPlatform;
use crate::types::{
    JobsPage, RegistrationTokenPayload, RunnerPayload, RunnersPage, WorkflowRunPayload,
};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: usize = 100;

/// GitHub Actions client scoped to one repository.
pub struct GitHubClient {
    inner: reqwest::Client,
    base_url: String,
    token: String,
    repository: Repository,
}

impl GitHubClient {
    /// Create a new client. The token is not validated here.
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        repository: Repository,
    ) -> Result<Self, PlatformError> {
        debug!(repository = %repository, "Initializing GitHub client");

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let inner = reqwest::Client::builder()
            .user_agent(concat!("ghrunner/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            repository,
        })
    }

    /// Repository this client is scoped to.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.repository.owner, self.repository.name, path
        )
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.inner.get(url).bearer_auth(&self.token)
    }

    fn expect(
        response: Response,
        expected: StatusCode,
        path: &str,
    ) -> Result<Response, PlatformError> {
        if response.status() != expected {
            return Err(PlatformError::UnexpectedStatus {
                path: path.to_string(),
                expected: expected.as_u16(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
        response
            .json()
            .await
            .map_err(|e| PlatformError::Serialization(e.to_string()))
    }

    /// List every runner registered to the repository.
    pub async fn list_runners(&self) -> Result<Vec<Runner>, PlatformError> {
        let path = "/actions/runners";
        let url = self.repo_url(path);
        let mut runners = Vec::new();

        for page in 1.. {
            debug!(url = %url, page, "Listing runners");
            let response = self
                .get(&url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let body: RunnersPage =
                Self::decode(Self::expect(response, StatusCode::OK, path)?).await?;

            let fetched = body.runners.len();
            runners.extend(body.runners.into_iter().map(Runner::from));
            if fetched == 0 || runners.len() >= body.total_count {
                break;
            }
        }

        Ok(runners)
    }

    /// List every job of a run, whatever its status.
    pub async fn list_jobs(&self, run_id: RunId) -> Result<Vec<CiJob>, PlatformError> {
        let path = format!("/actions/runs/{run_id}/jobs");
        let url = self.repo_url(&path);
        let mut jobs = Vec::new();

        for page in 1.. {
            debug!(url = %url, page, "Listing run jobs");
            let response = self
                .get(&url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?;
            let body: JobsPage =
                Self::decode(Self::expect(response, StatusCode::OK, &path)?).await?;

            let fetched = body.jobs.len();
            jobs.extend(body.jobs.into_iter().map(CiJob::from));
            if fetched == 0 || jobs.len() >= body.total_count {
                break;
            }
        }

        Ok(jobs)
    }
}

#[async_trait]
impl CiPlatform for GitHubClient {
    async fn get_run(&self, run_id: RunId) -> Result<CiRun, PlatformError> {
        let path = format!("/actions/runs/{run_id}");
        debug!(run_id = %run_id, "Getting workflow run");

        let response = self.get(&self.repo_url(&path)).send().await?;
        let run: WorkflowRunPayload =
            Self::decode(Self::expect(response, StatusCode::OK, &path)?).await?;

        debug!(run_id = %run_id, "Got workflow run");
        Ok(run.into())
    }

    async fn queued_jobs(&self, run: &CiRun) -> Result<Vec<CiJob>, PlatformError> {
        let queued: Vec<CiJob> = self
            .list_jobs(run.id)
            .await?
            .into_iter()
            .filter(|job| job.status.is_queued())
            .collect();

        debug!(run_id = %run.id, queued = queued.len(), "Got queued jobs");
        Ok(queued)
    }

    async fn mint_registration_token(&self) -> Result<RegistrationToken, PlatformError> {
        let path = "/actions/runners/registration-token";
        debug!("Generating runner registration token");

        let response = self
            .inner
            .post(self.repo_url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let payload: RegistrationTokenPayload =
            Self::decode(Self::expect(response, StatusCode::CREATED, path)?).await?;

        Ok(payload.token)
    }

    async fn find_runners_by_label(&self, label: &str) -> Result<Vec<Runner>, PlatformError> {
        let runners: Vec<Runner> = self
            .list_runners()
            .await?
            .into_iter()
            .filter(|r| r.has_label(label))
            .collect();

        debug!(label, found = runners.len(), "Listed labeled runners");
        Ok(runners)
    }

    async fn get_runner(&self, id: RunnerId) -> Result<Runner, PlatformError> {
        let path = format!("/actions/runners/{id}");
        debug!(runner_id = %id, "Getting runner");

        let response = self.get(&self.repo_url(&path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(format!("runner {id}")));
        }
        let runner: RunnerPayload =
            Self::decode(Self::expect(response, StatusCode::OK, &path)?).await?;

        Ok(runner.into())
    }

    async fn remove_runner(&self, id: RunnerId) -> Result<(), PlatformError> {
        let path = format!("/actions/runners/{id}");
        debug!(runner_id = %id, "Removing runner");

        let response = self
            .inner
            .delete(self.repo_url(&path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PlatformError::UnexpectedStatus {
                path,
                expected: StatusCode::NO_CONTENT.as_u16(),
                status: response.status().as_u16(),
            });
        }

        debug!(runner_id = %id, "Removed runner");
        Ok(())
    }
}
