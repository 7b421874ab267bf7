//! ghrunner tend loop
//!
//! Provisions one ephemeral self-hosted runner per queued job of a CI run:
//! - [`tend`] polls the run, deduplicates jobs and launches lifecycles
//! - [`JobLifecycle`] mints a token, creates the instance, waits for the
//!   runner to come and go, then destroys the instance
//! - [`runner_wait`] holds the bounded waits on runner registration
//! - [`RunnerConfig`] maps job labels to configured providers

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod runner_wait;
pub mod table;
pub mod tend;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, RunnerConfig, RunnerType, Timings};
pub use error::TendError;
pub use lifecycle::JobLifecycle;
pub use table::JobTable;
pub use tend::{tend, Session};
