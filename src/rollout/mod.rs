//! Rollout health — "is tenant X's fleet in sync?"
//!
//! Compares each agent's most recent sync attempt against the tenant's latest
//! published version. The report is derived on every call from the version
//! store and the sync log; there is no cached or materialized health table
//! that could drift from the two sources.

pub mod classify;

pub use classify::{classify, AgentSyncState};

use crate::config::defaults::FRESHNESS_WINDOW_SECS;
use crate::error::HubError;
use crate::store::{retry_read, HubStore, SyncLogStore, VersionStore};
use crate::types::{SyncAttempt, SyncStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Health of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    /// `agentId` when the agent supplies one, otherwise its version string
    pub agent_key: String,
    pub agent_version: String,
    pub state: AgentSyncState,
    pub applied_version: Option<i64>,
    pub last_status: SyncStatus,
    pub last_synced_at: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Failed attempts within the freshness window
    pub recent_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub current: usize,
    pub stale: usize,
    pub erroring: usize,
    pub unknown: usize,
}

impl HealthSummary {
    fn count(&mut self, state: AgentSyncState) {
        match state {
            AgentSyncState::Current => self.current += 1,
            AgentSyncState::Stale => self.stale += 1,
            AgentSyncState::Erroring => self.erroring += 1,
            AgentSyncState::Unknown => self.unknown += 1,
        }
    }

    pub const fn total(&self) -> usize {
        self.current + self.stale + self.erroring + self.unknown
    }
}

/// Fleet sync health for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetHealth {
    pub tenant_id: String,
    pub latest_published_version: Option<i64>,
    pub evaluated_at: DateTime<Utc>,
    pub freshness_window_secs: i64,
    pub summary: HealthSummary,
    pub agents: Vec<AgentHealth>,
}

impl FleetHealth {
    /// True when every known agent runs the latest published version.
    pub fn in_sync(&self) -> bool {
        self.summary.total() > 0 && self.summary.current == self.summary.total()
    }
}

#[derive(Clone)]
pub struct RolloutAggregator {
    store: Arc<dyn HubStore>,
    freshness_window: Duration,
}

impl RolloutAggregator {
    pub fn new(store: Arc<dyn HubStore>) -> Self {
        Self {
            store,
            freshness_window: Duration::seconds(FRESHNESS_WINDOW_SECS as i64),
        }
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub const fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Build the health report using the configured window.
    pub async fn sync_health(&self, tenant_id: &str) -> Result<FleetHealth, HubError> {
        self.sync_health_at(tenant_id, self.freshness_window, Utc::now())
            .await
    }

    /// Build the health report for an explicit window and evaluation time.
    pub async fn sync_health_at(
        &self,
        tenant_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<FleetHealth, HubError> {
        let latest = retry_read("get_latest_published", || {
            self.store.get_latest_published(tenant_id)
        })
        .await?
        .map(|row| row.version);

        let last_attempts = retry_read("last_attempt_per_agent", || {
            self.store.last_attempt_per_agent(tenant_id)
        })
        .await?;

        let since = now - window;
        let recent = retry_read("recent_attempts", || {
            self.store.recent_attempts(tenant_id, since)
        })
        .await?;
        let failures = failures_by_agent(&recent);

        let mut summary = HealthSummary::default();
        let agents: Vec<AgentHealth> = last_attempts
            .into_iter()
            .map(|(agent_key, attempt)| {
                let state = classify(&attempt, latest, now, window);
                summary.count(state);
                AgentHealth {
                    recent_failures: failures.get(agent_key.as_str()).copied().unwrap_or(0),
                    agent_key,
                    agent_version: attempt.agent_version,
                    state,
                    applied_version: attempt.applied_config_version,
                    last_status: attempt.sync_status,
                    last_synced_at: attempt.synced_at,
                    last_error: attempt.error_message,
                }
            })
            .collect();

        debug!(
            tenant_id,
            latest_published = latest,
            agents = agents.len(),
            current = summary.current,
            stale = summary.stale,
            erroring = summary.erroring,
            unknown = summary.unknown,
            "Fleet sync health evaluated"
        );

        Ok(FleetHealth {
            tenant_id: tenant_id.to_string(),
            latest_published_version: latest,
            evaluated_at: now,
            freshness_window_secs: window.num_seconds(),
            summary,
            agents,
        })
    }
}

fn failures_by_agent(attempts: &[SyncAttempt]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for attempt in attempts.iter().filter(|a| a.sync_status == SyncStatus::Failure) {
        *counts.entry(attempt.agent_key()).or_insert(0) += 1;
    }
    counts
}
