//! Runner configuration.
//!
//! Decoded once at startup from YAML; afterwards immutable. Example:
//!
//! ```yaml
//! runners:
//!   self-hosted-small:
//!     provider: scw-small
//! providers:
//!   scw-small:
//!     scaleway:
//!       access: { key_id: SCW..., key_secret: ..., project: ... }
//!       image: ubuntu_jammy
//!       instance-type: DEV1-S
//!       zone: fr-par-1
//! ```

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use ghrunner_core::job::DEFAULT_MAX_RETRY;
use ghrunner_core::{PollBudget, Repository};
use ghrunner_provider::{Provider, ProviderBase, ProviderError, ScalewayConfig, ScalewayProvider};

/// Configuration errors. All of them are raised before tending starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a file nor stdin provided a configuration.
    #[error("could not find config")]
    Missing,

    /// Reading the configuration failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML does not match the expected shape.
    #[error("failed to decode config: {0}")]
    Decode(#[from] serde_yaml::Error),

    /// The configuration decoded but is inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A provider entry could not be built.
    #[error("provider {name}: {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Sleep intervals, retry counts and wait budgets of a tend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timings {
    /// Sleep when a run has no queued jobs.
    #[serde(rename = "idle_poll_secs", deserialize_with = "secs")]
    pub idle_poll: Duration,

    /// Sleep after handling a batch of queued jobs.
    #[serde(rename = "tick_secs", deserialize_with = "secs")]
    pub tick: Duration,

    /// Sleep between drain scans once the run is completed.
    #[serde(rename = "drain_poll_secs", deserialize_with = "secs")]
    pub drain_poll: Duration,

    /// Sleep between create/destroy attempts.
    #[serde(rename = "retry_delay_secs", deserialize_with = "secs")]
    pub retry_delay: Duration,

    /// Create/destroy attempts per job.
    pub max_retry: u32,

    /// Budget for a new runner to show up by label.
    pub appear: PollBudget,

    /// Budget for a runner to leave `offline`.
    pub activate: PollBudget,

    /// Budget for a runner to de-register after its job.
    pub deregister: PollBudget,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(20),
            tick: Duration::from_secs(20),
            drain_poll: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            max_retry: DEFAULT_MAX_RETRY,
            appear: PollBudget::new(12, Duration::from_secs(5)),
            activate: PollBudget::new(12, Duration::from_secs(10)),
            deregister: PollBudget::new(20, Duration::from_secs(30)),
        }
    }
}

impl Timings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retry == 0 {
            return Err(ConfigError::Invalid("tend.max_retry must be at least 1".into()));
        }
        for (name, budget) in [
            ("appear", self.appear),
            ("activate", self.activate),
            ("deregister", self.deregister),
        ] {
            if budget.attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tend.{name}.attempts must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    runners: BTreeMap<String, RawRunner>,
    providers: BTreeMap<String, RawProvider>,
    #[serde(default)]
    tend: Timings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRunner {
    provider: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProvider {
    #[serde(default)]
    scaleway: Option<ScalewayConfig>,
    #[serde(default)]
    gcp: Option<serde_yaml::Value>,
}

/// A configured runner type: the label it serves and the provider prototype.
pub struct RunnerType {
    /// Name under `runners`.
    pub name: String,

    /// Job label this runner type handles.
    pub label: String,

    /// Prototype cloned for every job of this type.
    pub provider: Box<dyn Provider>,
}

/// Decoded runner configuration.
pub struct RunnerConfig {
    runners: Vec<RunnerType>,
    timings: Timings,
}

impl RunnerConfig {
    /// Create an empty configuration.
    pub fn new(timings: Timings) -> Self {
        Self {
            runners: Vec::new(),
            timings,
        }
    }

    /// Builder method to add a runner type.
    pub fn with_runner(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        provider: Box<dyn Provider>,
    ) -> Self {
        self.runners.push(RunnerType {
            name: name.into(),
            label: label.into(),
            provider,
        });
        self
    }

    /// Decode and validate a YAML configuration.
    pub fn parse<R: Read>(mut reader: R, repository: &Repository) -> Result<Self, ConfigError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        if content.trim().is_empty() {
            return Err(ConfigError::Missing);
        }
        Self::from_yaml_str(&content, repository)
    }

    /// Decode and validate a YAML configuration held in memory.
    pub fn from_yaml_str(content: &str, repository: &Repository) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        raw.tend.validate()?;

        if raw.providers.is_empty() {
            return Err(ConfigError::Invalid("no provider declared".into()));
        }

        let mut providers: BTreeMap<String, Box<dyn Provider>> = BTreeMap::new();
        for (name, entry) in raw.providers {
            if entry.gcp.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "provider {name}: gcp is not supported"
                )));
            }
            let Some(settings) = entry.scaleway else {
                return Err(ConfigError::Invalid(format!(
                    "provider {name} does not declare a kind"
                )));
            };
            let provider = ScalewayProvider::new(settings, ProviderBase::new(repository.clone()))
                .map_err(|source| ConfigError::Provider {
                    name: name.clone(),
                    source,
                })?;
            debug!(provider = %name, kind = provider.kind(), "Configured provider");
            providers.insert(name, Box::new(provider));
        }

        let mut config = Self::new(raw.tend);
        let mut labels = HashSet::new();
        for (name, runner) in raw.runners {
            let provider = providers.get(&runner.provider).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "runner {name} references unknown provider {}",
                    runner.provider
                ))
            })?;
            let label = runner.label.unwrap_or_else(|| name.clone());
            if !labels.insert(label.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "label {label} is served by more than one runner"
                )));
            }
            config = config.with_runner(name, label, provider.clone_box());
        }

        Ok(config)
    }

    /// First runner type matching `labels`, scanning the labels in order.
    pub fn runner_for_labels(&self, labels: &[String]) -> Option<&RunnerType> {
        labels
            .iter()
            .find_map(|label| self.runners.iter().find(|r| &r.label == label))
    }

    /// Timings decoded from the `tend` section.
    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Configured runner types.
    pub fn runners(&self) -> &[RunnerType] {
        &self.runners
    }
}
