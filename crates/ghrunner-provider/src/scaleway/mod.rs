//! Scaleway instance backend.
//!
//! Creation runs: render cloud-init, create a stopped server, attach a public
//! IPv4, upload the user data, power on and wait for `running`. A server left
//! behind by an earlier failed attempt with the same name is picked up again
//! instead of creating a second one, and only the steps it is still missing
//! are replayed: the IP when none is attached, power-on when it is `stopped`.

mod api;
#[cfg(test)]
mod mock;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use ghrunner_core::{await_condition, ErrorAction, InstanceName, PollBudget, PollError};

use crate::error::ProviderError;
use crate::provider::{Provider, ProviderBase};
use api::{exact_match, CreateServerRequest, InstanceApi, Scope, Server};

/// Public Scaleway API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

const STATE_RUNNING: &str = "running";
const STATE_STARTING: &str = "starting";
const STATE_STOPPED: &str = "stopped";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Settings of a Scaleway runner type, as written under `providers.<name>.scaleway`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScalewayConfig {
    /// API credentials and ownership scope.
    pub access: ScalewayAccess,

    /// Image id or label.
    pub image: String,

    /// Commercial type (e.g. `DEV1-S`).
    pub instance_type: String,

    /// Zone (e.g. `fr-par-1`).
    pub zone: String,

    /// Security group id.
    #[serde(default)]
    pub security_group: Option<String>,

    /// Tags put on the server and its IP.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Cloud-init template, see [`crate::user_data`].
    #[serde(default)]
    pub cloud_init: Option<String>,

    /// API endpoint override.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// Scaleway credentials.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalewayAccess {
    /// Access key id.
    pub key_id: String,

    /// Secret key, sent as `X-Auth-Token`.
    pub key_secret: String,

    /// Project owning created resources.
    #[serde(default)]
    pub project: Option<String>,

    /// Organisation owning created resources when no project is set.
    #[serde(default)]
    pub organisation: Option<String>,
}

impl fmt::Debug for ScalewayAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalewayAccess")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("project", &self.project)
            .field("organisation", &self.organisation)
            .finish()
    }
}

/// Scaleway implementation of [`Provider`].
#[derive(Clone)]
pub struct ScalewayProvider {
    base: ProviderBase,
    config: Arc<ScalewayConfig>,
    api: InstanceApi,
    boot: PollBudget,
    teardown: PollBudget,
}

impl ScalewayProvider {
    /// Build a provider from its settings.
    pub fn new(config: ScalewayConfig, base: ProviderBase) -> Result<Self, ProviderError> {
        if config.access.key_secret.trim().is_empty() {
            return Err(ProviderError::Config("scaleway access.key_secret is empty".into()));
        }
        if config.access.project.is_none() && config.access.organisation.is_none() {
            return Err(ProviderError::Config(
                "scaleway access needs a project or an organisation".into(),
            ));
        }

        let api = InstanceApi::new(&config.api_url, &config.zone, &config.access.key_secret);
        Ok(Self {
            base,
            config: Arc::new(config),
            api,
            // power-on is given 5 minutes, termination 2 minutes
            boot: PollBudget::new(60, Duration::from_secs(5)),
            teardown: PollBudget::new(24, Duration::from_secs(5)),
        })
    }

    /// Settings this provider was built from.
    pub fn config(&self) -> &ScalewayConfig {
        &self.config
    }

    fn scope(&self) -> Scope<'_> {
        match self.config.access.project.as_deref() {
            Some(project) => Scope {
                project: Some(project),
                organization: None,
            },
            None => Scope {
                project: None,
                organization: self.config.access.organisation.as_deref(),
            },
        }
    }

    async fn find_server(&self, name: &InstanceName) -> Result<Option<Server>, ProviderError> {
        let servers = self.api.list_servers(self.scope(), name.as_str()).await?;
        exact_match(servers, name.as_str())
    }

    async fn wait_for_state(&self, server: &Server, state: &str) -> Result<(), ProviderError> {
        await_condition(
            &format!("wait for the server to enter {state:?} state"),
            &server.id,
            self.boot,
            || self.api.get_server(&server.id),
            |s: &Server| s.state == state,
            |_: &ProviderError| ErrorAction::Abort,
        )
        .await
        .map(|_| ())
        .map_err(from_poll)
    }

    async fn wait_for_removal(&self, server: &Server) -> Result<(), ProviderError> {
        await_condition(
            "wait for the server to be removed",
            &server.id,
            self.teardown,
            || self.api.get_server(&server.id),
            |_: &Server| false,
            |e: &ProviderError| {
                if e.is_not_found() {
                    ErrorAction::Accept
                } else {
                    ErrorAction::Abort
                }
            },
        )
        .await
        .map(|_| ())
        .map_err(from_poll)
    }
}

fn from_poll(e: PollError<ProviderError>) -> ProviderError {
    match e {
        PollError::Fatal { source, .. } => source,
        timeout @ PollError::Timeout { .. } => ProviderError::Timeout(timeout.to_string()),
    }
}

#[async_trait]
impl Provider for ScalewayProvider {
    fn kind(&self) -> &'static str {
        "scaleway"
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

    async fn create_instance(&self, name: &InstanceName) -> Result<(), ProviderError> {
        debug!(instance = %name, "Creating and running scaleway instance");

        let user_data = self
            .base
            .render_user_data(self.config.cloud_init.as_deref(), name)?;

        let server = match self.find_server(name).await? {
            Some(server) if server.state == STATE_RUNNING && server.has_public_ip() => {
                info!(instance = %name, server = %server.id, "Scaleway instance already running");
                return Ok(());
            }
            Some(server) => {
                warn!(instance = %name, server = %server.id, state = %server.state, "Resuming scaleway server from an earlier attempt");
                server
            }
            None => {
                let request = CreateServerRequest {
                    name: name.as_str(),
                    commercial_type: &self.config.instance_type,
                    image: &self.config.image,
                    dynamic_ip_required: true,
                    project: self.scope().project,
                    organization: self.scope().organization,
                    security_group: self.config.security_group.as_deref(),
                    tags: &self.config.tags,
                };
                let server = self.api.create_server(&request).await?;
                debug!(instance = %name, server = %server.id, "Created scaleway server");
                server
            }
        };

        if !server.has_public_ip() {
            let ip = self
                .api
                .attach_ip(self.scope(), &server.id, &self.config.tags)
                .await?;
            debug!(
                server = %server.id,
                ip_id = %ip.id,
                address = ip.address.as_deref().unwrap_or("pending"),
                "Attached IPv4 to scaleway server"
            );
        }

        match server.state.as_str() {
            STATE_STOPPED => {
                if let Some(content) = user_data {
                    self.api.set_cloud_init(&server.id, content).await?;
                }
                self.api.action(&server.id, "poweron").await?;
            }
            STATE_STARTING | STATE_RUNNING => {
                debug!(instance = %name, state = %server.state, "Scaleway server already powered on");
            }
            other => {
                return Err(ProviderError::UnexpectedState {
                    name: name.to_string(),
                    state: other.to_string(),
                });
            }
        }
        self.wait_for_state(&server, STATE_RUNNING).await?;

        info!(instance = %name, server = %server.id, "Scaleway instance is running");
        Ok(())
    }

    async fn destroy_instance(&self, name: &InstanceName) -> Result<(), ProviderError> {
        debug!(instance = %name, "Destroying scaleway instance");

        let Some(server) = self.find_server(name).await? else {
            warn!(instance = %name, "Instance not found, assuming it is already deleted");
            return Ok(());
        };

        let sent = if server.state == STATE_STOPPED {
            self.api.delete_server(&server.id).await
        } else {
            self.api.action(&server.id, "terminate").await
        };
        match sent {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(instance = %name, "Server vanished before termination");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        self.wait_for_removal(&server).await?;
        info!(instance = %name, server = %server.id, "Destroyed scaleway instance");
        Ok(())
    }

    async fn instance_status(&self, name: &InstanceName) -> Result<(), ProviderError> {
        match self.find_server(name).await? {
            Some(server) => {
                debug!(instance = %name, state = %server.state, "Scaleway instance status");
                Ok(())
            }
            None => Err(ProviderError::NotFound(name.to_string())),
        }
    }
}
