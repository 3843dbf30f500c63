//! Health check endpoint

use crate::hub::HubState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub durable: bool,
}

pub async fn get_health(State(hub): State<Arc<HubState>>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match hub.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, backend = hub.store.backend_name(), "Store health check failed");
            false
        }
    };

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if store_ok { "healthy" } else { "degraded" },
            backend: hub.store.backend_name(),
            durable: hub.store.is_durable(),
        }),
    )
}
