//! Sync Audit Log — append-only record of every agent pull attempt
//!
//! The audit trail is diagnostic, not transactional with the data transfer:
//! a failure to log a sync must never turn the sync itself into a failure.
//! `record_attempt` therefore never returns an error; storage failures are
//! logged and surfaced as [`RecordResult::Dropped`] for the HTTP layer to
//! translate.

use crate::error::HubError;
use crate::store::{retry_read, HubStore, SyncLogStore};
use crate::types::{NewSyncAttempt, SyncAttempt, SyncOutcome, SyncStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Stored in place of a missing error message on a non-success attempt.
pub const MISSING_ERROR_MESSAGE: &str = "no error message reported";

/// Result of recording one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordResult {
    Recorded(SyncAttempt),
    /// The store could not take the row; `unavailable` is set on a storage outage.
    Dropped { reason: String, unavailable: bool },
}

impl RecordResult {
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

#[derive(Clone)]
pub struct SyncAuditLog {
    store: Arc<dyn HubStore>,
}

impl SyncAuditLog {
    pub fn new(store: Arc<dyn HubStore>) -> Self {
        Self { store }
    }

    /// Append one attempt. `synced_at` is stamped here, never taken from the
    /// agent, so health comparisons do not depend on agent clocks.
    pub async fn record_attempt(
        &self,
        tenant_id: Option<&str>,
        agent_version: &str,
        outcome: SyncOutcome,
    ) -> RecordResult {
        let attempt = normalize(tenant_id, agent_version, outcome, Utc::now());

        match self.store.append_attempt(attempt).await {
            Ok(row) => {
                info!(
                    tenant_id = row.tenant_id.as_deref().unwrap_or("-"),
                    agent = %row.agent_key(),
                    status = %row.sync_status,
                    applied_version = row.applied_config_version,
                    duration_ms = row.duration_ms,
                    "Sync attempt recorded"
                );
                RecordResult::Recorded(row)
            }
            Err(err) => {
                error!(
                    tenant_id = tenant_id.unwrap_or("-"),
                    agent_version,
                    error = %err,
                    "Failed to record sync attempt"
                );
                RecordResult::Dropped {
                    unavailable: err.is_unavailable(),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Attempts for the tenant since `since`, newest first.
    pub async fn recent_attempts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SyncAttempt>, HubError> {
        Ok(retry_read("recent_attempts", || self.store.recent_attempts(tenant_id, since)).await?)
    }

    /// Latest attempt per agent key for the tenant.
    pub async fn last_attempt_per_agent(
        &self,
        tenant_id: &str,
    ) -> Result<BTreeMap<String, SyncAttempt>, HubError> {
        Ok(retry_read("last_attempt_per_agent", || {
            self.store.last_attempt_per_agent(tenant_id)
        })
        .await?)
    }
}

/// Bring a reported outcome in line with the audit row invariants instead of
/// rejecting it: the agent's report is kept even when it is inconsistent.
fn normalize(
    tenant_id: Option<&str>,
    agent_version: &str,
    outcome: SyncOutcome,
    synced_at: DateTime<Utc>,
) -> NewSyncAttempt {
    let error_message = match outcome.status {
        SyncStatus::Success => {
            if outcome.error_message.is_some() {
                warn!(agent_version, "Dropping error message reported with a successful sync");
            }
            None
        }
        SyncStatus::Failure | SyncStatus::Partial => Some(
            outcome
                .error_message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_string()),
        ),
    };

    NewSyncAttempt {
        tenant_id: tenant_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        agent_id: outcome.agent_id.filter(|id| !id.trim().is_empty()),
        agent_version: agent_version.to_string(),
        sync_status: outcome.status,
        applied_config_version: outcome.applied_version,
        duration_ms: outcome.duration_ms.max(0),
        error_message,
        synced_at,
    }
}
