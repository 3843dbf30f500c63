//! Persistence seam for version snapshots and the sync audit log
//!
//! ## Backends
//!
//! - `memory`   — `tokio::sync::RwLock` maps; tests and single-node development
//! - `postgres` — durable sqlx backend (feature `postgres`)
//!
//! Both backends enforce `(tenant_id, version)` uniqueness themselves. The
//! publish coordinator relies on that constraint, not on an in-process lock,
//! so several hub instances can share one database.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::config::defaults::{STORE_READ_RETRY_ATTEMPTS, STORE_READ_RETRY_BASE_MS};
use crate::types::{NewSyncAttempt, SyncAttempt, TenantConfigVersion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("tenant '{tenant_id}' version {version} already exists")]
    Conflict { tenant_id: String, version: i64 },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Immutable per-tenant version snapshots.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Highest version number ever claimed for the tenant, drafts included.
    async fn max_version(&self, tenant_id: &str) -> StoreResult<Option<i64>>;

    /// Insert a new `draft` row. Fails with `Conflict` if the number is taken.
    async fn append_draft(
        &self,
        tenant_id: &str,
        version: i64,
        payload: &serde_json::Value,
        author_id: &str,
    ) -> StoreResult<TenantConfigVersion>;

    /// Flip a draft to `published` and stamp `published_at`.
    async fn mark_published(&self, tenant_id: &str, version: i64)
        -> StoreResult<TenantConfigVersion>;

    async fn get_latest_published(&self, tenant_id: &str)
        -> StoreResult<Option<TenantConfigVersion>>;

    async fn get_by_version(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<Option<TenantConfigVersion>>;

    /// Rows ordered by version descending, strictly below `before` when given.
    async fn list_history(
        &self,
        tenant_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> StoreResult<Vec<TenantConfigVersion>>;
}

/// Append-only record of agent pull attempts.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append_attempt(&self, attempt: NewSyncAttempt) -> StoreResult<SyncAttempt>;

    /// Attempts for the tenant at or after `since`, newest first.
    async fn recent_attempts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SyncAttempt>>;

    /// Most recent attempt for every agent key seen for the tenant.
    async fn last_attempt_per_agent(
        &self,
        tenant_id: &str,
    ) -> StoreResult<BTreeMap<String, SyncAttempt>>;
}

/// Everything the hub needs from its persistence layer.
#[async_trait]
pub trait HubStore: VersionStore + SyncLogStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

/// Run an idempotent read, retrying a bounded number of times while the
/// backend reports itself unavailable.
pub async fn retry_read<T, F, Fut>(operation: &str, mut read: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match read().await {
            Err(err) if err.is_unavailable() && attempt < STORE_READ_RETRY_ATTEMPTS => {
                let backoff = STORE_READ_RETRY_BASE_MS << (attempt - 1);
                warn!(operation, attempt, backoff_ms = backoff, error = %err, "Store read failed, retrying");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
