//! Instance providers for ghrunner.
//!
//! The tend loop only ever talks to [`Provider`]; each cloud backend lives in
//! its own module and composes a [`ProviderBase`] for the shared fields.

pub mod error;
pub mod provider;
pub mod scaleway;
pub mod user_data;

pub use error::ProviderError;
pub use provider::{Provider, ProviderBase};
pub use scaleway::{ScalewayConfig, ScalewayProvider};
