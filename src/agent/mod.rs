//! Viewer agent — pulls the tenant's current configuration and reports back
//!
//! ## Modules
//!
//! - `config` — Agent settings (hub URL, tenant, identity, schedule)
//! - `client` — HTTP client for the hub's pull and report endpoints
//! - `apply`  — Writing a fetched configuration to local disk
//! - `sync`   — One pull cycle and the periodic sync loop

pub mod apply;
pub mod client;
pub mod config;
pub mod sync;

pub use apply::{ApplyError, ApplyOutcome, ConfigApplier, FileApplier};
pub use client::{ConfigClient, FetchResult};
pub use config::AgentConfig;
pub use sync::{run_config_sync, sync_once, CycleReport};

/// Agent-side errors
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Hub returned status {0}")]
    ServerError(reqwest::StatusCode),
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Invalid agent configuration: {0}")]
    Config(String),
}

impl AgentError {
    /// True when the hub could not be reached or is failing as a whole, as
    /// opposed to answering a request it considers wrong.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::ServerError(status) => status.is_server_error(),
            Self::Decode(_) | Self::Config(_) => false,
        }
    }
}
