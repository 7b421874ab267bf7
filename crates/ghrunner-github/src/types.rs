//! GitHub REST payloads.

use serde::Deserialize;

use ghrunner_core::{CiJob, CiRun, CiStatus, RegistrationToken, RunId, Runner, RunnerId};

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunPayload {
    pub id: u64,
    #[serde(default)]
    pub status: Option<CiStatus>,
}

impl From<WorkflowRunPayload> for CiRun {
    fn from(p: WorkflowRunPayload) -> Self {
        CiRun::new(RunId::new(p.id), p.status.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobsPage {
    pub total_count: usize,
    pub jobs: Vec<WorkflowJobPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowJobPayload {
    pub id: u64,
    pub name: String,
    pub status: CiStatus,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl From<WorkflowJobPayload> for CiJob {
    fn from(p: WorkflowJobPayload) -> Self {
        CiJob {
            id: p.id,
            name: p.name,
            status: p.status,
            labels: p.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationTokenPayload {
    pub token: RegistrationToken,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunnersPage {
    pub total_count: usize,
    pub runners: Vec<RunnerPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunnerPayload {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LabelPayload {
    pub name: String,
}

impl From<RunnerPayload> for Runner {
    fn from(p: RunnerPayload) -> Self {
        Runner {
            id: RunnerId::new(p.id),
            name: p.name,
            status: p.status,
            labels: p.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_jobs_page() {
        let body = r#"{
            "total_count": 2,
            "jobs": [
                {"id": 11, "name": "build", "status": "queued", "labels": ["self-hosted-small"]},
                {"id": 12, "name": "lint", "status": "in_progress", "labels": ["ubuntu-latest"], "conclusion": null}
            ]
        }"#;
        let page: JobsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.total_count, 2);

        let jobs: Vec<CiJob> = page.jobs.into_iter().map(CiJob::from).collect();
        assert_eq!(jobs[0].name, "build");
        assert!(jobs[0].status.is_queued());
        assert_eq!(jobs[0].labels, vec!["self-hosted-small".to_string()]);
        assert_eq!(jobs[1].status, CiStatus::InProgress);
    }

    #[test]
    fn test_decode_runner_labels() {
        let body = r#"{
            "total_count": 1,
            "runners": [{
                "id": 23, "name": "runner-5-abcdef12", "os": "linux", "status": "online", "busy": true,
                "labels": [{"id": 1, "name": "self-hosted", "type": "read-only"},
                           {"id": 2, "name": "runner-5-abcdef12", "type": "custom"}]
            }]
        }"#;
        let page: RunnersPage = serde_json::from_str(body).unwrap();
        let runner = Runner::from(page.runners.into_iter().next().unwrap());
        assert_eq!(runner.id, RunnerId::new(23));
        assert_eq!(runner.status, "online");
        assert!(runner.has_label("runner-5-abcdef12"));
    }

    #[test]
    fn test_decode_run_without_status() {
        let run: WorkflowRunPayload = serde_json::from_str(r#"{"id": 9, "status": null}"#).unwrap();
        let run = CiRun::from(run);
        assert_eq!(run.status, CiStatus::Queued);
        assert!(!run.is_completed());
    }

    #[test]
    fn test_decode_registration_token() {
        let payload: RegistrationTokenPayload =
            serde_json::from_str(r#"{"token": "LLBF3JGZDX3P5PMEXLND6TS6FCWO6", "expires_at": "2020-01-22T12:13:35.123-08:00"}"#)
                .unwrap();
        assert_eq!(payload.token.expose(), "LLBF3JGZDX3P5PMEXLND6TS6FCWO6");
    }
}
