//! PostgreSQL-backed hub store.
//!
//! The `(tenant_id, version)` primary key is the only concurrency control the
//! publish path needs: two hubs racing for the same number both attempt the
//! insert and the loser sees a unique violation, mapped to
//! `StoreError::Conflict`. A trigger installed by the migrations rejects any
//! update other than the single draft -> published flip.

use super::{HubStore, StoreError, StoreResult, SyncLogStore, VersionStore};
use crate::types::{NewSyncAttempt, SyncAttempt, TenantConfigVersion, LEGACY_AGENT_KEY_PREFIX};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;

const VERSION_COLUMNS: &str =
    "tenant_id, version, payload, status, published_at, created_at, created_by";

const ATTEMPT_COLUMNS: &str = "id, tenant_id, agent_id, agent_version, sync_status, \
     applied_config_version, duration_ms, error_message, synced_at";

#[derive(sqlx::FromRow)]
struct DbVersion {
    tenant_id: String,
    version: i64,
    payload: serde_json::Value,
    status: String,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: String,
}

#[derive(sqlx::FromRow)]
struct DbAttempt {
    id: i64,
    tenant_id: Option<String>,
    agent_id: Option<String>,
    agent_version: String,
    sync_status: String,
    applied_config_version: Option<i64>,
    duration_ms: i64,
    error_message: Option<String>,
    synced_at: DateTime<Utc>,
}

impl TryFrom<DbVersion> for TenantConfigVersion {
    type Error = StoreError;

    fn try_from(row: DbVersion) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse().map_err(anyhow::Error::msg)?,
            tenant_id: row.tenant_id,
            version: row.version,
            payload: row.payload,
            published_at: row.published_at,
            created_at: row.created_at,
            created_by: row.created_by,
        })
    }
}

impl TryFrom<DbAttempt> for SyncAttempt {
    type Error = StoreError;

    fn try_from(row: DbAttempt) -> Result<Self, Self::Error> {
        Ok(Self {
            sync_status: row.sync_status.parse().map_err(anyhow::Error::msg)?,
            id: row.id,
            tenant_id: row.tenant_id,
            agent_id: row.agent_id,
            agent_version: row.agent_version,
            applied_config_version: row.applied_config_version,
            duration_ms: row.duration_ms,
            error_message: row.error_message,
            synced_at: row.synced_at,
        })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Unexpected(other.into()),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().is_some_and(|code| code == "23505");
    }
    false
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VersionStore for PgStore {
    async fn max_version(&self, tenant_id: &str) -> StoreResult<Option<i64>> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM tenant_config_versions WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
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

        let inserted = sqlx::query_as::<_, DbVersion>(&format!(
            "INSERT INTO tenant_config_versions (tenant_id, version, payload, status, created_by) \
             VALUES ($1, $2, $3, 'draft', $4) RETURNING {VERSION_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(version)
        .bind(payload)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => row.try_into(),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict {
                tenant_id: tenant_id.to_string(),
                version,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn mark_published(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<TenantConfigVersion> {
        let updated = sqlx::query_as::<_, DbVersion>(&format!(
            "UPDATE tenant_config_versions SET status = 'published', published_at = NOW() \
             WHERE tenant_id = $1 AND version = $2 AND status = 'draft' \
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return row.try_into();
        }

        // Nothing flipped: either the row is missing or it was already published
        match self.get_by_version(tenant_id, version).await? {
            Some(_) => Err(StoreError::InvalidState(format!(
                "tenant '{tenant_id}' version {version} is already published"
            ))),
            None => Err(StoreError::NotFound(format!(
                "tenant '{tenant_id}' version {version}"
            ))),
        }
    }

    async fn get_latest_published(
        &self,
        tenant_id: &str,
    ) -> StoreResult<Option<TenantConfigVersion>> {
        sqlx::query_as::<_, DbVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM tenant_config_versions \
             WHERE tenant_id = $1 AND status = 'published' \
             ORDER BY version DESC LIMIT 1"
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn get_by_version(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> StoreResult<Option<TenantConfigVersion>> {
        sqlx::query_as::<_, DbVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM tenant_config_versions \
             WHERE tenant_id = $1 AND version = $2"
        ))
        .bind(tenant_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?
        .map(TryInto::try_into)
        .transpose()
    }

    async fn list_history(
        &self,
        tenant_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> StoreResult<Vec<TenantConfigVersion>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DbVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM tenant_config_versions \
             WHERE tenant_id = $1 AND ($2::BIGINT IS NULL OR version < $2) \
             ORDER BY version DESC LIMIT $3"
        ))
        .bind(tenant_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl SyncLogStore for PgStore {
    async fn append_attempt(&self, attempt: NewSyncAttempt) -> StoreResult<SyncAttempt> {
        let row = sqlx::query_as::<_, DbAttempt>(&format!(
            "INSERT INTO sync_attempts (tenant_id, agent_id, agent_version, sync_status, \
             applied_config_version, duration_ms, error_message, synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(&attempt.tenant_id)
        .bind(&attempt.agent_id)
        .bind(&attempt.agent_version)
        .bind(attempt.sync_status.as_str())
        .bind(attempt.applied_config_version)
        .bind(attempt.duration_ms)
        .bind(&attempt.error_message)
        .bind(attempt.synced_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn recent_attempts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SyncAttempt>> {
        let rows = sqlx::query_as::<_, DbAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM sync_attempts \
             WHERE tenant_id = $1 AND synced_at >= $2 \
             ORDER BY synced_at DESC, id DESC"
        ))
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn last_attempt_per_agent(
        &self,
        tenant_id: &str,
    ) -> StoreResult<BTreeMap<String, SyncAttempt>> {
        let rows = sqlx::query_as::<_, DbAttempt>(&format!(
            "SELECT DISTINCT ON (COALESCE(agent_id, '{LEGACY_AGENT_KEY_PREFIX}' || agent_version)) {ATTEMPT_COLUMNS} \
             FROM sync_attempts WHERE tenant_id = $1 \
             ORDER BY COALESCE(agent_id, '{LEGACY_AGENT_KEY_PREFIX}' || agent_version), synced_at DESC, id DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let attempt = SyncAttempt::try_from(row)?;
                Ok((attempt.agent_key(), attempt))
            })
            .collect()
    }
}

#[async_trait]
impl HubStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detects_only_db_codes() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_unavailable());
    }

    #[test]
    fn test_db_row_with_unknown_status_is_rejected() {
        let row = DbVersion {
            tenant_id: "t1".to_string(),
            version: 1,
            payload: serde_json::json!({}),
            status: "archived".to_string(),
            published_at: None,
            created_at: Utc::now(),
            created_by: "alice".to_string(),
        };
        assert!(TenantConfigVersion::try_from(row).is_err());
    }
}
