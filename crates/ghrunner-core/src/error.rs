//! Core domain errors.

use thiserror::Error;

use crate::JobStatus;

/// Core domain errors for ghrunner.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Tracked job not found.
    #[error("Tracked job not found: {0}")]
    JobNotFound(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
