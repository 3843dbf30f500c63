//! Agent runtime configuration

use super::AgentError;
use crate::config::defaults::{
    AGENT_HTTP_TIMEOUT_SECS, AGENT_SYNC_INTERVAL_SECS, AGENT_SYNC_JITTER_SECS,
};
use std::path::PathBuf;

/// Fallback identity when neither `--agent-id` nor a host name is available.
const FALLBACK_AGENT_ID: &str = "manifest-agent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Hub base URL (e.g., "http://hub.internal:8080")
    pub hub_url: String,
    pub tenant_id: String,
    /// Stable identity reported with every sync result
    pub agent_id: String,
    /// Software version reported with every pull and sync result
    pub agent_version: String,
    /// Where the applied manifest is written
    pub apply_path: PathBuf,
    pub interval_secs: u64,
    pub jitter_secs: u64,
    pub http_timeout_secs: u64,
}

impl AgentConfig {
    pub fn new(hub_url: &str, tenant_id: &str, apply_path: impl Into<PathBuf>) -> Self {
        Self {
            hub_url: hub_url.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            agent_id: default_agent_id(),
            agent_version: default_agent_version(),
            apply_path: apply_path.into(),
            interval_secs: AGENT_SYNC_INTERVAL_SECS,
            jitter_secs: AGENT_SYNC_JITTER_SECS,
            http_timeout_secs: AGENT_HTTP_TIMEOUT_SECS,
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if !(self.hub_url.starts_with("http://") || self.hub_url.starts_with("https://")) {
            return Err(AgentError::Config(format!(
                "hub URL must start with http:// or https://, got '{}'",
                self.hub_url
            )));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(AgentError::Config("tenant must not be empty".to_string()));
        }
        if self.agent_id.trim().is_empty() {
            return Err(AgentError::Config("agent id must not be empty".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(AgentError::Config("sync interval must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// `manifest-agent/<crate version>`
pub fn default_agent_version() -> String {
    format!("manifest-agent/{}", env!("CARGO_PKG_VERSION"))
}

/// Host name from `HOSTNAME` or `/etc/hostname`, else a fixed fallback.
pub fn default_agent_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| FALLBACK_AGENT_ID.to_string())
}
