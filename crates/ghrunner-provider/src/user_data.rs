//! Cloud-init user-data templating.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::ProviderError;

const TEMPLATE_NAME: &str = "cloud-init";

/// Variables available to a user-data template.
#[derive(Debug, Clone, Serialize)]
pub struct UserDataContext<'a> {
    /// `owner/name` of the repository the runner registers to.
    pub repository: String,
    /// Runner and instance name.
    pub runner_name: &'a str,
    /// Registration token, empty when the provider does not want one.
    pub registration_token: &'a str,
    /// Runner-type label that selected this provider.
    pub runner_label: &'a str,
    /// Unique id of this creation attempt.
    pub runner_id: String,
}

/// Render `template` with `context`.
///
/// Unknown variables are an error rather than an empty string, so a typo in
/// the template never produces a runner that silently fails to register.
pub fn render(template: &str, context: &UserDataContext<'_>) -> Result<String, ProviderError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template(TEMPLATE_NAME, template)?;
    let rendered = env.get_template(TEMPLATE_NAME)?.render(context)?;
    Ok(rendered)
}
