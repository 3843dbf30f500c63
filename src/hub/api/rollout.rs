//! Rollout endpoints: fleet sync health and the raw audit trail

use super::error::ApiError;
use crate::config::defaults::MAX_FRESHNESS_WINDOW_SECS;
use crate::hub::HubState;
use crate::rollout::FleetHealth;
use crate::types::SyncAttempt;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHealthQuery {
    /// Override the configured freshness window for this report
    pub freshness_secs: Option<u64>,
}

/// GET /api/v1/tenant/:id/sync-health — Per-agent classification and summary
pub async fn get_sync_health(
    State(hub): State<Arc<HubState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<SyncHealthQuery>,
) -> Result<Json<FleetHealth>, ApiError> {
    let window = match query.freshness_secs {
        Some(secs) if secs == 0 || secs > MAX_FRESHNESS_WINDOW_SECS => {
            return Err(ApiError::BadRequest(format!(
                "freshnessSecs must be between 1 and {MAX_FRESHNESS_WINDOW_SECS}"
            )))
        }
        Some(secs) => Duration::seconds(secs as i64),
        None => hub.rollout.freshness_window(),
    };

    let health = hub
        .rollout
        .sync_health_at(&tenant_id, window, Utc::now())
        .await?;
    Ok(Json(health))
}

#[derive(Debug, Deserialize)]
pub struct SyncAttemptsQuery {
    /// RFC 3339 lower bound; defaults to one freshness window ago
    pub since: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttemptsResponse {
    pub tenant_id: String,
    pub since: DateTime<Utc>,
    pub attempts: Vec<SyncAttempt>,
}

/// GET /api/v1/tenant/:id/sync-attempts — Audit rows since a point in time
pub async fn list_sync_attempts(
    State(hub): State<Arc<HubState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<SyncAttemptsQuery>,
) -> Result<Json<SyncAttemptsResponse>, ApiError> {
    let since = match query.since.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| ApiError::BadRequest(format!("since is not an RFC 3339 timestamp: {e}")))?,
        None => Utc::now() - hub.rollout.freshness_window(),
    };

    let attempts = hub.audit.recent_attempts(&tenant_id, since).await?;
    Ok(Json(SyncAttemptsResponse {
        tenant_id,
        since,
        attempts,
    }))
}
