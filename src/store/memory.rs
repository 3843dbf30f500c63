//! In-memory implementation of the hub store.
//!
//! Versions are kept per tenant in a `BTreeMap` keyed by version number, so
//! ordering queries fall out of the map. The sync log is a plain `Vec`, ids are
//! assigned under the write lock.
//!
//! Not durable: all state is lost on restart, and separate processes do not
//! share state. Uniqueness of `(tenant, version)` is checked under the write
//! lock, which gives concurrent publishers the same conflict behaviour as the
//! database constraint does for the Postgres backend.

use super::{HubStore, StoreError, StoreResult, SyncLogStore, VersionStore};
use crate::types::{NewSyncAttempt, SyncAttempt, TenantConfigVersion, VersionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type VersionMap = HashMap<String, BTreeMap<i64, TenantConfigVersion>>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    versions: Arc<RwLock<VersionMap>>,
    attempts: Arc<RwLock<Vec<SyncAttempt>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for InMemoryStore {
    async fn max_version(&self, tenant_id: &str) -> StoreResult<Option<i64>> {
        let versions = self.versions.read().await;
        Ok(versions
            .get(tenant_id)
            .and_then(|rows| rows.keys().next_back().copied()))
    }

    async fn append_draft(
        &self,
        tenant_id: &str,
        version: i64,
        payload: &serde_json::Value,
        author_id: &str,
    ) -> StoreResult<TenantConfigVersion> {
        if version < 1 {
            return Err(StoreError::InvalidState(format!(
                "version must be positive, got {version}"
            )));
        }

        let mut versions = self.versions.write().await;
        let rows = versions.entry(tenant_id.to_string()).or_default();
        if rows.contains_key(&version) {
            return Err(StoreError::Conflict {
                tenant_id: tenant_id.to_string(),
                version,
            });
        }

        let row = TenantConfigVersion {
            tenant_id: tenant_id.to_string(),
            version,
            payload: payload.clone(),
            status: VersionStatus::Draft,
            published_at: None,
            created_at: Utc::now(),
            created_by: author_id.to_string(),
        };
        rows.insert(version, row.clone());
        Ok(row)
    }

    async fn mark_published(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<TenantConfigVersion> {
        let mut versions = self.versions.write().await;
        let row = versions
            .get_mut(tenant_id)
            .and_then(|rows| rows.get_mut(&version))
            .ok_or_else(|| StoreError::NotFound(format!("tenant '{tenant_id}' version {version}")))?;

        if row.is_published() {
            return Err(StoreError::InvalidState(format!(
                "tenant '{tenant_id}' version {version} is already published"
            )));
        }

        row.status = VersionStatus::Published;
        row.published_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn get_latest_published(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Option<TenantConfigVersion>> {
        let versions = self.versions.read().await;
        Ok(versions.get(tenant_id).and_then(|rows| {
            rows.values()
                .rev()
                .find(|row| row.is_published())
                .cloned()
        }))
    }

    async fn get_by_version(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<Option<TenantConfigVersion>> {
        let versions = self.versions.read().await;
        Ok(versions
            .get(tenant_id)
            .and_then(|rows| rows.get(&version))
            .cloned())
    }

    async fn list_history(
        &self,
        tenant_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> StoreResult<Vec<TenantConfigVersion>> {
        let versions = self.versions.read().await;
        let Some(rows) = versions.get(tenant_id) else {
            return Ok(Vec::new());
        };
        let upper = before.unwrap_or(i64::MAX);
        Ok(rows
            .range(..upper)
            .rev()
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

#[async_trait]
impl SyncLogStore for InMemoryStore {
    async fn append_attempt(&self, attempt: NewSyncAttempt) -> StoreResult<SyncAttempt> {
        let mut attempts = self.attempts.write().await;
        let row = SyncAttempt {
            id: attempts.len() as i64 + 1,
            tenant_id: attempt.tenant_id,
            agent_id: attempt.agent_id,
            agent_version: attempt.agent_version,
            sync_status: attempt.sync_status,
            applied_config_version: attempt.applied_config_version,
            duration_ms: attempt.duration_ms,
            error_message: attempt.error_message,
            synced_at: attempt.synced_at,
        };
        attempts.push(row.clone());
        Ok(row)
    }

    async fn recent_attempts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SyncAttempt>> {
        let attempts = self.attempts.read().await;
        let mut rows: Vec<SyncAttempt> = attempts
            .iter()
            .filter(|a| a.tenant_id.as_deref() == Some(tenant_id) && a.synced_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.synced_at, b.id).cmp(&(a.synced_at, a.id)));
        Ok(rows)
    }

    async fn last_attempt_per_agent(
        &self,
        tenant_id: &str,
    ) -> StoreResult<BTreeMap<String, SyncAttempt>> {
        let attempts = self.attempts.read().await;
        let mut latest: BTreeMap<String, SyncAttempt> = BTreeMap::new();
        for attempt in attempts
            .iter()
            .filter(|a| a.tenant_id.as_deref() == Some(tenant_id))
        {
            let key = attempt.agent_key();
            let newer = latest
                .get(&key)
                .map_or(true, |seen| (attempt.synced_at, attempt.id) > (seen.synced_at, seen.id));
            if newer {
                latest.insert(key, attempt.clone());
            }
        }
        Ok(latest)
    }
}

#[async_trait]
impl HubStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
