//! CI-platform collaborator for ghrunner.
//!
//! [`CiPlatform`] is the set of operations the tend loop needs from the CI
//! platform. [`GitHubClient`] implements it over the GitHub REST API.

pub mod client;
pub mod error;
pub mod platform;
mod types;

pub use client::{GitHubClient, DEFAULT_API_URL};
pub use error::PlatformError;
pub use platform::CiPlatform;
