//! Agent-facing endpoints: configuration pull and sync result reporting

use super::error::ApiError;
use crate::audit::RecordResult;
use crate::config::defaults::ZSTD_LEVEL;
use crate::hub::HubState;
use crate::types::SyncReport;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Response header carrying the served version number.
pub const CONFIG_VERSION_HEADER: &str = "x-config-version";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConfigQuery {
    pub tenant: String,
    #[serde(default)]
    pub agent_version: Option<String>,
    /// Version the agent already holds; a match yields `304 Not Modified`
    #[serde(default)]
    pub known_version: Option<i64>,
}

/// GET /api/v1/current-config — Latest published configuration for a tenant
pub async fn get_current_config(
    State(hub): State<Arc<HubState>>,
    Query(query): Query<CurrentConfigQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if query.tenant.trim().is_empty() {
        return Err(ApiError::BadRequest("tenant must not be empty".to_string()));
    }
    let agent_version = query.agent_version.as_deref().unwrap_or("unknown");

    let current = hub
        .distribution
        .fetch_current(&query.tenant, agent_version)
        .await?;
    let version_header = HeaderValue::from(current.version);

    if query.known_version == Some(current.version) {
        debug!(tenant_id = %query.tenant, version = current.version, "Agent already current");
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(CONFIG_VERSION_HEADER, version_header)],
        )
            .into_response());
    }

    let json = serde_json::to_vec(&current)
        .map_err(|e| ApiError::Internal(format!("serialization error: {e}")))?;

    let accepts_zstd = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("zstd"))
        .unwrap_or(false);

    if accepts_zstd {
        match zstd::encode_all(json.as_slice(), ZSTD_LEVEL) {
            Ok(compressed) => {
                return Ok((
                    [
                        (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                        (header::CONTENT_ENCODING, HeaderValue::from_static("zstd")),
                        (header::HeaderName::from_static(CONFIG_VERSION_HEADER), version_header),
                    ],
                    compressed,
                )
                    .into_response());
            }
            Err(e) => warn!(error = %e, "zstd compression failed, sending uncompressed"),
        }
    }

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::HeaderName::from_static(CONFIG_VERSION_HEADER), version_header),
        ],
        json,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultResponse {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<i64>,
}

/// POST /api/v1/sync-result — Record the outcome of one agent pull cycle
///
/// Always accepted unless the store is down: a report the store rejects for
/// any other reason is logged and acknowledged with `recorded: false`. A body
/// that does not parse as a report gets the regular 400 error envelope.
pub async fn post_sync_result(
    State(hub): State<Arc<HubState>>,
    report: Result<Json<SyncReport>, JsonRejection>,
) -> Response {
    let report = match report {
        Ok(Json(report)) => report,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed sync report");
            return ApiError::BadRequest(format!("invalid sync report: {}", rejection.body_text()))
                .into_response();
        }
    };
    let (tenant, agent_version, outcome) = report.into_parts();

    match hub
        .audit
        .record_attempt(tenant.as_deref(), &agent_version, outcome)
        .await
    {
        RecordResult::Recorded(row) => (
            StatusCode::ACCEPTED,
            Json(SyncResultResponse {
                recorded: true,
                attempt_id: Some(row.id),
            }),
        )
            .into_response(),
        RecordResult::Dropped { unavailable, .. } => {
            let status = if unavailable {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::ACCEPTED
            };
            (
                status,
                Json(SyncResultResponse {
                    recorded: false,
                    attempt_id: None,
                }),
            )
                .into_response()
        }
    }
}
