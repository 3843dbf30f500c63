//! Core data types for tenant configuration versioning and agent sync
//!
//! - **TenantConfigVersion**: immutable, monotonically numbered snapshot of a
//!   tenant's manifest (the "metadata version")
//! - **SyncAttempt**: one agent pull cycle's recorded outcome (the "sync log")
//! - **SyncOutcome**: what an agent reports at the end of a pull cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of the agent key given to attempts reported without an `agentId`.
pub const LEGACY_AGENT_KEY_PREFIX: &str = "version:";

/// Lifecycle state of a version row.
///
/// `Draft` only exists for the brief window between claiming a version number
/// and publishing it. There is no transition back from `Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Published,
}

impl VersionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown version status '{other}'")),
        }
    }
}

/// An immutable snapshot of a tenant's compiled dashboard configuration.
///
/// Identity is `(tenant_id, version)`. The payload is write-once; the only
/// permitted mutation is the single `Draft -> Published` flip, which stamps
/// `published_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigVersion {
    pub tenant_id: String,
    /// Positive, strictly increasing per tenant
    pub version: i64,
    /// Opaque manifest document
    pub payload: serde_json::Value,
    pub status: VersionStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl TenantConfigVersion {
    pub fn is_published(&self) -> bool {
        self.status == VersionStatus::Published
    }
}

/// Outcome class of one agent sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failure,
    Partial,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Partial => "partial",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// What an agent reports about a finished pull cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    /// Stable agent identifier, when the agent has one
    pub agent_id: Option<String>,
    pub applied_version: Option<i64>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

impl SyncOutcome {
    pub fn success(applied_version: i64, duration_ms: i64) -> Self {
        Self {
            status: SyncStatus::Success,
            agent_id: None,
            applied_version: Some(applied_version),
            duration_ms,
            error_message: None,
        }
    }

    pub fn failure(error: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            status: SyncStatus::Failure,
            agent_id: None,
            applied_version: None,
            duration_ms,
            error_message: Some(error.into()),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_applied_version(mut self, version: Option<i64>) -> Self {
        self.applied_version = version;
        self
    }
}

/// A sync attempt ready to be appended to the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncAttempt {
    pub tenant_id: Option<String>,
    pub agent_id: Option<String>,
    pub agent_version: String,
    pub sync_status: SyncStatus,
    pub applied_config_version: Option<i64>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// One row of the append-only sync audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttempt {
    pub id: i64,
    /// Absent for agents that failed before identifying a tenant
    pub tenant_id: Option<String>,
    pub agent_id: Option<String>,
    pub agent_version: String,
    pub sync_status: SyncStatus,
    pub applied_config_version: Option<i64>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub synced_at: DateTime<Utc>,
}

impl SyncAttempt {
    /// Key used to group attempts by agent.
    ///
    /// Agents that supply a stable id are tracked individually; older agents
    /// only identify themselves by version string and are grouped under
    /// `version:<agentVersion>`, so an id can never collide with that group.
    pub fn agent_key(&self) -> String {
        match &self.agent_id {
            Some(id) => id.clone(),
            None => format!("{LEGACY_AGENT_KEY_PREFIX}{}", self.agent_version),
        }
    }
}

/// Body of `POST /sync-result`, sent by agents after every pull cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub agent_version: String,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_version: Option<i64>,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SyncReport {
    /// Split into the tenant, agent version and outcome the audit log records.
    pub fn into_parts(self) -> (Option<String>, String, SyncOutcome) {
        let outcome = SyncOutcome {
            status: self.status,
            agent_id: self.agent_id,
            applied_version: self.applied_version,
            duration_ms: self.duration_ms,
            error_message: self.error_message,
        };
        (self.tenant, self.agent_version, outcome)
    }
}

/// The current configuration served to a pull client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConfig {
    pub version: i64,
    pub payload: serde_json::Value,
}

impl From<TenantConfigVersion> for CurrentConfig {
    fn from(row: TenantConfigVersion) -> Self {
        Self {
            version: row.version,
            payload: row.payload,
        }
    }
}
