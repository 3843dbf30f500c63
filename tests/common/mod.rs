//! Shared test helpers
//!
//! `FaultyStore` delegates to an in-memory store and injects the failures the
//! in-memory backend never produces on its own. Each switch can be flipped
//! mid-test, so a test can break a step and then let the next call succeed.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use manifest_hub::store::{
    HubStore, InMemoryStore, StoreError, StoreResult, SyncLogStore, VersionStore,
};
use manifest_hub::types::{NewSyncAttempt, SyncAttempt, TenantConfigVersion};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Backend detail that must stay in the hub's logs.
pub const BACKEND_DETAIL: &str = "connection refused to 10.0.0.5:5432";

#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    /// Every draft append reports the number as taken
    pub always_conflict: AtomicBool,
    /// Draft appends fail with `Unavailable`
    pub append_down: AtomicBool,
    /// Publishing a claimed draft fails with `Unavailable`
    pub mark_published_down: AtomicBool,
    /// Sync log appends fail with `Unavailable`
    pub sync_log_down: AtomicBool,
    /// Sync log appends fail with a non-outage error
    pub sync_log_rejects: AtomicBool,
}

impl FaultyStore {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

fn is_set(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

fn unavailable() -> StoreError {
    StoreError::Unavailable(BACKEND_DETAIL.to_string())
}

#[async_trait]
impl VersionStore for FaultyStore {
    async fn max_version(&self, tenant_id: &str) -> StoreResult<Option<i64>> {
        self.inner.max_version(tenant_id).await
    }

    async fn append_draft(
        &self,
        tenant_id: &str,
        version: i64,
        payload: &Value,
        author_id: &str,
    ) -> StoreResult<TenantConfigVersion> {
        if is_set(&self.append_down) {
            return Err(unavailable());
        }
        if is_set(&self.always_conflict) {
            return Err(StoreError::Conflict {
                tenant_id: tenant_id.to_string(),
                version,
            });
        }
        self.inner.append_draft(tenant_id, version, payload, author_id).await
    }

    async fn mark_published(&self, tenant_id: &str, version: i64) -> StoreResult<TenantConfigVersion> {
        if is_set(&self.mark_published_down) {
            return Err(unavailable());
        }
        self.inner.mark_published(tenant_id, version).await
    }

    async fn get_latest_published(&self, tenant_id: &str) -> StoreResult<Option<TenantConfigVersion>> {
        self.inner.get_latest_published(tenant_id).await
    }

    async fn get_by_version(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<Option<TenantConfigVersion>> {
        self.inner.get_by_version(tenant_id, version).await
    }

    async fn list_history(
        &self,
        tenant_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> StoreResult<Vec<TenantConfigVersion>> {
        self.inner.list_history(tenant_id, limit, before).await
    }
}

#[async_trait]
impl SyncLogStore for FaultyStore {
    async fn append_attempt(&self, attempt: NewSyncAttempt) -> StoreResult<SyncAttempt> {
        if is_set(&self.sync_log_down) {
            return Err(unavailable());
        }
        if is_set(&self.sync_log_rejects) {
            return Err(StoreError::InvalidState("sync_attempts check constraint violated".to_string()));
        }
        self.inner.append_attempt(attempt).await
    }

    async fn recent_attempts(&self, tenant_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<SyncAttempt>> {
        self.inner.recent_attempts(tenant_id, since).await
    }

    async fn last_attempt_per_agent(&self, tenant_id: &str) -> StoreResult<BTreeMap<String, SyncAttempt>> {
        self.inner.last_attempt_per_agent(tenant_id).await
    }
}

#[async_trait]
impl HubStore for FaultyStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
