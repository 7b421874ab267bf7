//! The capability surface every instance backend implements.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use ghrunner_core::{InstanceName, RegistrationToken, Repository};

use crate::error::ProviderError;
use crate::user_data::{self, UserDataContext};

/// Fields shared by every backend, composed into each concrete provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderBase {
    /// Repository the runner registers to.
    pub repository: Option<Repository>,

    /// Registration token minted for the next creation.
    pub registration_token: Option<RegistrationToken>,

    /// Runner-type label that selected this provider.
    pub runner_label: Option<String>,
}

impl ProviderBase {
    /// Create a base bound to a repository.
    pub fn new(repository: Repository) -> Self {
        Self {
            repository: Some(repository),
            ..Self::default()
        }
    }

    /// Render the backend's user-data template for `name`.
    ///
    /// Returns `Ok(None)` when the backend has no template configured.
    pub fn render_user_data(
        &self,
        template: Option<&str>,
        name: &InstanceName,
    ) -> Result<Option<String>, ProviderError> {
        let Some(template) = template else {
            warn!(instance = %name, "cloud-init is not set, nothing to render");
            return Ok(None);
        };

        let context = UserDataContext {
            repository: self
                .repository
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            runner_name: name.as_str(),
            registration_token: self
                .registration_token
                .as_ref()
                .map(RegistrationToken::expose)
                .unwrap_or_default(),
            runner_label: self.runner_label.as_deref().unwrap_or_default(),
            runner_id: Uuid::new_v4().to_string(),
        };

        user_data::render(template, &context).map(Some)
    }
}

/// An instance backend (one implementation per cloud/target).
///
/// The tend loop clones a configured prototype per job with [`Provider::clone_box`],
/// then sets the label and token on that copy, so concurrent jobs never share
/// provider state.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend name used in logs and configuration.
    fn kind(&self) -> &'static str;

    /// Shared fields.
    fn base(&self) -> &ProviderBase;

    /// Shared fields, mutably.
    fn base_mut(&mut self) -> &mut ProviderBase;

    /// Clone into a fresh boxed provider.
    fn clone_box(&self) -> Box<dyn Provider>;

    /// Create the instance and return once it is durably created.
    ///
    /// Callers retry this verbatim on failure.
    async fn create_instance(&self, name: &InstanceName) -> Result<(), ProviderError>;

    /// Destroy the instance. An instance that is already gone is a success.
    async fn destroy_instance(&self, name: &InstanceName) -> Result<(), ProviderError>;

    /// Check the instance. Not consulted by the job lifecycle.
    async fn instance_status(&self, name: &InstanceName) -> Result<(), ProviderError>;

    /// Whether the controller must mint a registration token before creation.
    fn wants_registration_token(&self) -> bool {
        true
    }

    /// Inject a freshly minted registration token.
    fn with_registration_token(&mut self, token: RegistrationToken) {
        self.base_mut().registration_token = Some(token);
    }

    /// Record which runner-type label triggered this instance.
    fn with_runner_label(&mut self, label: &str) {
        self.base_mut().runner_label = Some(label.to_string());
    }
}

impl Clone for Box<dyn Provider> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
