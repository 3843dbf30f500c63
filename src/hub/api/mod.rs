//! Hub API route registration

pub mod distribution;
pub mod error;
pub mod health;
pub mod rollout;
pub mod versions;

use crate::hub::HubState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Manifest Hub API router
pub fn build_router(state: Arc<HubState>) -> Router {
    // Publish bodies wrap the manifest in an envelope; leave room for it
    let body_limit = state.config.max_payload_size.saturating_mul(2);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let v1_routes = Router::new()
        // Agent pull and report
        .route("/current-config", get(distribution::get_current_config))
        .route("/sync-result", post(distribution::post_sync_result))
        // Authoring
        .route(
            "/tenant/:id/versions",
            get(versions::list_versions).post(versions::publish_version),
        )
        .route("/tenant/:id/versions/:version", get(versions::get_version))
        // Rollout health
        .route("/tenant/:id/sync-health", get(rollout::get_sync_health))
        .route("/tenant/:id/sync-attempts", get(rollout::list_sync_attempts))
        // Health
        .route("/health", get(health::get_health));

    Router::new()
        .nest("/api/v1", v1_routes)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
