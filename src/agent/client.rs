//! Config Client — HTTP client for agent → hub communication
//!
//! Pulls the current configuration (zstd-compressed when the hub supports it)
//! and reports the outcome of each pull cycle.

use super::{AgentConfig, AgentError};
use crate::types::{CurrentConfig, SyncReport};
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Result of one pull.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// A version differing from the one the agent holds
    Updated(CurrentConfig),
    /// The agent already holds the latest published version
    NotModified,
    /// The tenant has never published
    NoPublishedConfig,
}

/// HTTP client for hub communication
#[derive(Clone)]
pub struct ConfigClient {
    http: reqwest::Client,
    hub_url: String,
    tenant_id: String,
    agent_id: String,
    agent_version: String,
}

impl ConfigClient {
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            hub_url: config.hub_url.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            agent_id: config.agent_id.clone(),
            agent_version: config.agent_version.clone(),
        })
    }

    /// Pull the tenant's latest published configuration.
    pub async fn fetch_current(&self, known_version: Option<i64>) -> Result<FetchResult, AgentError> {
        let mut query = vec![
            ("tenant", self.tenant_id.clone()),
            ("agentVersion", self.agent_version.clone()),
        ];
        if let Some(v) = known_version {
            query.push(("knownVersion", v.to_string()));
        }

        let resp = self
            .http
            .get(format!("{}/api/v1/current-config", self.hub_url))
            .header(ACCEPT_ENCODING, "zstd")
            .query(&query)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_MODIFIED => Ok(FetchResult::NotModified),
            StatusCode::NOT_FOUND => {
                let body: serde_json::Value = resp.json().await.unwrap_or_default();
                if body["error"]["code"] == "no_published_config" {
                    Ok(FetchResult::NoPublishedConfig)
                } else {
                    Err(AgentError::ServerError(StatusCode::NOT_FOUND))
                }
            }
            StatusCode::OK => {
                let zstd_encoded = resp
                    .headers()
                    .get(CONTENT_ENCODING)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.eq_ignore_ascii_case("zstd"))
                    .unwrap_or(false);
                let body = resp.bytes().await?;
                let json = if zstd_encoded {
                    zstd::decode_all(body.as_ref()).map_err(|e| AgentError::Decode(e.to_string()))?
                } else {
                    body.to_vec()
                };
                let config: CurrentConfig =
                    serde_json::from_slice(&json).map_err(|e| AgentError::Decode(e.to_string()))?;
                debug!(version = config.version, compressed = zstd_encoded, "Configuration fetched");
                Ok(FetchResult::Updated(config))
            }
            status => Err(AgentError::ServerError(status)),
        }
    }

    /// Report the outcome of a pull cycle.
    pub async fn report_sync(&self, report: &SyncReport) -> Result<(), AgentError> {
        let resp = self
            .http
            .post(format!("{}/api/v1/sync-result", self.hub_url))
            .json(report)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(AgentError::ServerError(resp.status()))
        }
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_version(&self) -> &str {
        &self.agent_version
    }
}
