//! Scripted collaborators for lifecycle and loop tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ghrunner_core::{CiJob, CiRun, CiStatus, InstanceName, RegistrationToken, RunId, Runner, RunnerId};
use ghrunner_github::{CiPlatform, PlatformError};
use ghrunner_provider::{Provider, ProviderBase, ProviderError};

#[derive(Default)]
struct PlatformState {
    run_statuses: VecDeque<CiStatus>,
    queued: Vec<CiJob>,
    runners: Vec<Runner>,
    runner_states: HashMap<RunnerId, VecDeque<String>>,
    gone_after: HashMap<RunnerId, u32>,
    probes: HashMap<RunnerId, u32>,
    hidden_lookups: u32,
    registrations: u32,
    next_runner_id: u64,
    mint_fails: bool,

    get_run_calls: u32,
    queued_job_calls: u32,
    mint_calls: u32,
    find_calls: u32,
    get_runner_calls: u32,
}

/// In-memory CI platform for one run.
///
/// Successive `get_run` calls walk the scripted statuses and repeat the last
/// one. Every queued job is reported on every poll.
pub struct FakePlatform {
    run_id: RunId,
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: Mutex::new(PlatformState {
                next_runner_id: 1000,
                ..PlatformState::default()
            }),
        }
    }

    fn with(self, f: impl FnOnce(&mut PlatformState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_run_statuses(self, statuses: &[CiStatus]) -> Self {
        self.with(|s| s.run_statuses = statuses.iter().copied().collect())
    }

    pub fn with_queued_job(self, job: CiJob) -> Self {
        self.with(|s| s.queued.push(job))
    }

    pub fn with_runner(self, runner: Runner) -> Self {
        self.with(|s| s.runners.push(runner))
    }

    /// States returned by successive `get_runner(id)` calls; the last one repeats.
    pub fn with_runner_states(self, id: RunnerId, states: &[&str]) -> Self {
        self.with(|s| {
            s.runner_states
                .insert(id, states.iter().map(|st| st.to_string()).collect());
        })
    }

    /// `get_runner(id)` reports not-found after `probes` successful calls.
    pub fn with_runner_gone_after(self, id: RunnerId, probes: u32) -> Self {
        self.with(|s| {
            s.gone_after.insert(id, probes);
        })
    }

    /// The first `count` label lookups see no runner at all.
    pub fn with_hidden_runner_lookups(self, count: u32) -> Self {
        self.with(|s| s.hidden_lookups = count)
    }

    /// A lookup for an unknown label registers an online runner carrying it,
    /// which de-registers after one `get_runner` probe.
    pub fn registering_instances(self) -> Self {
        self.with(|s| s.registrations = 1)
    }

    /// Each registration shows up twice.
    pub fn with_duplicate_registrations(self) -> Self {
        self.with(|s| s.registrations = 2)
    }

    pub fn failing_mint(self) -> Self {
        self.with(|s| s.mint_fails = true)
    }

    pub fn get_run_calls(&self) -> u32 {
        self.state.lock().unwrap().get_run_calls
    }

    pub fn queued_job_calls(&self) -> u32 {
        self.state.lock().unwrap().queued_job_calls
    }

    pub fn mint_calls(&self) -> u32 {
        self.state.lock().unwrap().mint_calls
    }

    pub fn find_calls(&self) -> u32 {
        self.state.lock().unwrap().find_calls
    }

    pub fn get_runner_calls(&self) -> u32 {
        self.state.lock().unwrap().get_runner_calls
    }
}

#[async_trait]
impl CiPlatform for FakePlatform {
    async fn get_run(&self, run_id: RunId) -> Result<CiRun, PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.get_run_calls += 1;
        if run_id != self.run_id {
            return Err(PlatformError::NotFound(format!("run {run_id}")));
        }
        let status = if s.run_statuses.len() > 1 {
            s.run_statuses.pop_front().unwrap_or_default()
        } else {
            s.run_statuses.front().copied().unwrap_or(CiStatus::Completed)
        };
        Ok(CiRun::new(run_id, status))
    }

    async fn queued_jobs(&self, _run: &CiRun) -> Result<Vec<CiJob>, PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.queued_job_calls += 1;
        Ok(s.queued.clone())
    }

    async fn mint_registration_token(&self) -> Result<RegistrationToken, PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.mint_calls += 1;
        if s.mint_fails {
            return Err(PlatformError::UnexpectedStatus {
                path: "/actions/runners/registration-token".into(),
                expected: 201,
                status: 403,
            });
        }
        Ok(RegistrationToken::new(format!("token-{}", s.mint_calls)))
    }

    async fn find_runners_by_label(&self, label: &str) -> Result<Vec<Runner>, PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.find_calls += 1;
        if s.hidden_lookups > 0 {
            s.hidden_lookups -= 1;
            return Ok(Vec::new());
        }

        let known = s.runners.iter().any(|r| r.has_label(label));
        if !known {
            for _ in 0..s.registrations {
                let id = RunnerId::new(s.next_runner_id);
                s.next_runner_id += 1;
                s.runners
                    .push(Runner::new(id, label).with_label(label).with_status("online"));
                s.gone_after.insert(id, 1);
            }
        }

        Ok(s.runners.iter().filter(|r| r.has_label(label)).cloned().collect())
    }

    async fn get_runner(&self, id: RunnerId) -> Result<Runner, PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.get_runner_calls += 1;

        let probes = {
            let n = s.probes.entry(id).or_insert(0);
            *n += 1;
            *n
        };
        if s.gone_after.get(&id).is_some_and(|limit| probes > *limit) {
            return Err(PlatformError::NotFound(format!("runner {id}")));
        }

        let mut runner = s
            .runners
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("runner {id}")))?;

        if let Some(states) = s.runner_states.get_mut(&id) {
            let state = if states.len() > 1 {
                states.pop_front()
            } else {
                states.front().cloned()
            };
            if let Some(state) = state {
                runner.status = state;
            }
        }
        Ok(runner)
    }

    async fn remove_runner(&self, id: RunnerId) -> Result<(), PlatformError> {
        let mut s = self.state.lock().unwrap();
        s.runners.retain(|r| r.id != id);
        Ok(())
    }
}

#[derive(Default)]
struct ProviderLog {
    create_failures: u32,
    destroy_failures: u32,
    create_calls: u32,
    destroy_calls: u32,
    created: Vec<InstanceName>,
    tokens: Vec<Option<String>>,
    labels: Vec<Option<String>>,
}

/// Provider that records calls. Clones share one log.
#[derive(Clone)]
pub struct FakeProvider {
    base: ProviderBase,
    wants_token: bool,
    log: Arc<Mutex<ProviderLog>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            base: ProviderBase::default(),
            wants_token: true,
            log: Arc::default(),
        }
    }

    pub fn without_token(mut self) -> Self {
        self.wants_token = false;
        self
    }

    /// Fail the next `count` creations.
    pub fn failing_creates(self, count: u32) -> Self {
        self.log.lock().unwrap().create_failures = count;
        self
    }

    /// Fail the next `count` destructions.
    pub fn failing_destroys(self, count: u32) -> Self {
        self.log.lock().unwrap().destroy_failures = count;
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.log.lock().unwrap().create_calls
    }

    pub fn destroy_calls(&self) -> u32 {
        self.log.lock().unwrap().destroy_calls
    }

    pub fn created(&self) -> Vec<InstanceName> {
        self.log.lock().unwrap().created.clone()
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.log.lock().unwrap().tokens.clone()
    }

    pub fn labels_seen(&self) -> Vec<Option<String>> {
        self.log.lock().unwrap().labels.clone()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> &'static str {
        "fake"
    }

    fn base(&self) -> &ProviderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProviderBase {
        &mut self.base
    }

    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }

    fn wants_registration_token(&self) -> bool {
        self.wants_token
    }

    async fn create_instance(&self, name: &InstanceName) -> Result<(), ProviderError> {
        let mut log = self.log.lock().unwrap();
        log.create_calls += 1;
        log.tokens.push(
            self.base
                .registration_token
                .as_ref()
                .map(|t| t.expose().to_string()),
        );
        log.labels.push(self.base.runner_label.clone());
        if log.create_failures > 0 {
            log.create_failures -= 1;
            return Err(ProviderError::Api {
                provider: "fake",
                path: "/servers".into(),
                status: 500,
                message: "quota exceeded".into(),
            });
        }
        log.created.push(name.clone());
        Ok(())
    }

    async fn destroy_instance(&self, _name: &InstanceName) -> Result<(), ProviderError> {
        let mut log = self.log.lock().unwrap();
        log.destroy_calls += 1;
        if log.destroy_failures > 0 {
            log.destroy_failures -= 1;
            return Err(ProviderError::Timeout("server still present".into()));
        }
        Ok(())
    }

    async fn instance_status(&self, name: &InstanceName) -> Result<(), ProviderError> {
        let log = self.log.lock().unwrap();
        if log.created.contains(name) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(name.to_string()))
        }
    }
}
