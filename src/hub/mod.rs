//! Manifest Hub — HTTP server for configuration publish, pull and sync health
//!
//! ## Modules
//!
//! - `config` — Hub configuration (TOML file, env vars, CLI args)
//! - `db`     — PostgreSQL connection pool and migration runner
//! - `api`    — HTTP route handlers

pub mod api;
pub mod config;
#[cfg(feature = "postgres")]
pub mod db;

use crate::audit::SyncAuditLog;
use crate::distribution::Distribution;
use crate::publish::PublishCoordinator;
use crate::rollout::RolloutAggregator;
use crate::store::HubStore;
use std::sync::Arc;

/// Shared hub application state
pub struct HubState {
    /// Persistence backend (PostgreSQL or in-memory)
    pub store: Arc<dyn HubStore>,
    pub config: config::HubConfig,
    pub publisher: PublishCoordinator,
    pub distribution: Distribution,
    pub audit: SyncAuditLog,
    pub rollout: RolloutAggregator,
}

impl HubState {
    pub fn new(store: Arc<dyn HubStore>, config: config::HubConfig) -> Arc<Self> {
        let publisher = PublishCoordinator::new(Arc::clone(&store))
            .with_max_attempts(config.publish_max_attempts)
            .with_max_payload_bytes(config.max_payload_size);
        let rollout = RolloutAggregator::new(Arc::clone(&store)).with_freshness_window(
            chrono::Duration::seconds(config.freshness_window_secs as i64),
        );

        Arc::new(Self {
            distribution: Distribution::new(Arc::clone(&store)),
            audit: SyncAuditLog::new(Arc::clone(&store)),
            publisher,
            rollout,
            store,
            config,
        })
    }
}
