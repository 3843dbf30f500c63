//! Version endpoints: publish, history, single version

use super::error::ApiError;
use crate::hub::HubState;
use crate::types::TenantConfigVersion;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub payload: serde_json::Value,
    pub author_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub version: i64,
    pub published_at: Option<DateTime<Utc>>,
}

/// POST /api/v1/tenant/:id/versions — Validate and publish a new version
pub async fn publish_version(
    State(hub): State<Arc<HubState>>,
    Path(tenant_id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<PublishResponse>), ApiError> {
    let row = hub
        .publisher
        .publish(&tenant_id, req.payload, &req.author_id)
        .await?;

    info!(tenant_id = %tenant_id, version = row.version, author = %req.author_id, "Version published via API");

    Ok((
        StatusCode::CREATED,
        Json(PublishResponse {
            version: row.version,
            published_at: row.published_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    /// Only versions strictly below this one
    pub before: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub tenant_id: String,
    pub versions: Vec<TenantConfigVersion>,
    /// Pass as `before` to fetch the next page; absent on the last page
    pub next_before: Option<i64>,
}

/// GET /api/v1/tenant/:id/versions — Version history, newest first
pub async fn list_versions(
    State(hub): State<Arc<HubState>>,
    Path(tenant_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = hub.config.history_limit(query.limit);
    let versions = hub
        .distribution
        .history(&tenant_id, limit, query.before)
        .await?;

    let next_before = if versions.len() == limit {
        versions.last().map(|row| row.version).filter(|v| *v > 1)
    } else {
        None
    };

    Ok(Json(HistoryResponse {
        tenant_id,
        versions,
        next_before,
    }))
}

/// GET /api/v1/tenant/:id/versions/:version — One version row
pub async fn get_version(
    State(hub): State<Arc<HubState>>,
    Path((tenant_id, version)): Path<(String, i64)>,
) -> Result<Json<TenantConfigVersion>, ApiError> {
    let row = hub.distribution.get_version(&tenant_id, version).await?;
    Ok(Json(row))
}
