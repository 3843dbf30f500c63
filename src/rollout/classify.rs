//! Per-agent sync classification.
//!
//! Pure functions: everything here is derived from an attempt, the latest
//! published version and the clock, so it is recomputed on every query and
//! never stored.

use crate::types::{SyncAttempt, SyncStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// Where an agent stands relative to the tenant's latest published version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentSyncState {
    /// Applied version equals the latest published version
    Current,
    /// Applied an older version (or none)
    Stale,
    /// Most recent attempt failed
    Erroring,
    /// Not heard from within the freshness window
    Unknown,
}

impl fmt::Display for AgentSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::Erroring => "erroring",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classify an agent from its most recent attempt.
///
/// Order of checks: silent past the window is `Unknown`; a failed last
/// attempt is `Erroring`; with nothing published there is nothing to compare
/// against, so `Unknown`; otherwise `Current` or `Stale`. A `partial` attempt
/// is judged on the version it reports applying.
pub fn classify(
    last_attempt: &SyncAttempt,
    latest_published: Option<i64>,
    now: DateTime<Utc>,
    freshness_window: Duration,
) -> AgentSyncState {
    if last_attempt.synced_at < now - freshness_window {
        return AgentSyncState::Unknown;
    }
    if last_attempt.sync_status == SyncStatus::Failure {
        return AgentSyncState::Erroring;
    }
    let Some(latest) = latest_published else {
        return AgentSyncState::Unknown;
    };
    match last_attempt.applied_config_version {
        Some(applied) if applied == latest => AgentSyncState::Current,
        // Anything else, including a version the hub never published, is not current
        _ => AgentSyncState::Stale,
    }
}
