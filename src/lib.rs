//! Manifest Hub: tenant configuration versioning and distribution
//!
//! Turns authored dashboard manifests into immutable, numbered versions and
//! serves the latest one to intermittently connected viewer agents that pull
//! on their own schedule.
//!
//! ## Architecture
//!
//! - **Version Store**: append-only `(tenant, version)` rows, PostgreSQL or in-memory
//! - **Publish Coordinator**: validates a manifest and claims the next version
//! - **Distribution**: read-only "what is current for tenant X" surface
//! - **Sync Audit Log**: one row per agent pull attempt, never fails the caller
//! - **Rollout Aggregator**: derives per-agent current/stale/erroring/unknown
//! - **Agent**: the pull client, file applier and periodic sync loop

pub mod agent;
pub mod audit;
pub mod config;
pub mod distribution;
pub mod error;
pub mod hub;
pub mod manifest;
pub mod publish;
pub mod rollout;
pub mod store;
pub mod telemetry;
pub mod types;

pub use audit::{RecordResult, SyncAuditLog};
pub use distribution::Distribution;
pub use error::HubError;
pub use publish::PublishCoordinator;
pub use rollout::{AgentSyncState, FleetHealth, RolloutAggregator};
pub use store::{HubStore, InMemoryStore, StoreError, SyncLogStore, VersionStore};
pub use types::{
    CurrentConfig, SyncAttempt, SyncOutcome, SyncReport, SyncStatus, TenantConfigVersion,
    VersionStatus,
};
