//! Error types for the CI-platform collaborator.

use thiserror::Error;

/// Errors that can occur when talking to the CI platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Resource not found (label or id lookup came back empty).
    #[error("not found: {0}")]
    NotFound(String),

    /// A label lookup matched more than one runner.
    #[error("found {count} runners labeled {label:?}")]
    Ambiguous { label: String, count: usize },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with an unexpected status code.
    #[error("didn't get expected status code ({expected}) from {path}, got {status}")]
    UnexpectedStatus {
        path: String,
        expected: u16,
        status: u16,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl PlatformError {
    /// Returns true if the error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
