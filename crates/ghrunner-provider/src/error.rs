//! Provider errors.

use thiserror::Error;

/// Errors returned by instance providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The instance does not exist.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend API rejected a call.
    #[error("{provider} API error ({status}) on {path}: {message}")]
    Api {
        provider: &'static str,
        path: String,
        status: u16,
        message: String,
    },

    /// More than one instance matched a name.
    #[error("matched {count} instances with the name {name:?}")]
    Ambiguous { name: String, count: usize },

    /// User-data template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Provider settings are incomplete or inconsistent.
    #[error("invalid provider configuration: {0}")]
    Config(String),

    /// The instance is in a state the operation cannot proceed from.
    #[error("instance {name} is {state:?}")]
    UnexpectedState { name: String, state: String },

    /// A backend-side wait ran out of attempts.
    #[error("{0}")]
    Timeout(String),
}

impl ProviderError {
    /// Returns true if the error reports a missing instance.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
