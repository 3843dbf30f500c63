//! System-wide default constants.
//!
//! Centralises magic numbers that would otherwise be scattered across the
//! hub, the store backends and the agent. Grouped by subsystem.

// ============================================================================
// Hub Server
// ============================================================================

/// Default bind address for the hub HTTP server.
pub const HUB_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Maximum request body / manifest size in bytes (1 MB).
pub const HUB_MAX_PAYLOAD_BYTES: usize = 1_048_576;

/// Per-request service-level timeout (seconds).
pub const HUB_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Publish Coordinator
// ============================================================================

/// How many times a publish re-reads the max version after losing a race.
pub const PUBLISH_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// Version History
// ============================================================================

/// Page size for version history when the caller gives no `limit`.
pub const HISTORY_DEFAULT_LIMIT: usize = 50;

/// Upper bound on a single version history page.
pub const HISTORY_MAX_LIMIT: usize = 500;

// ============================================================================
// Rollout Health
// ============================================================================

/// Freshness window: an agent that has not reported within this span is
/// classified `unknown` (seconds). 3 600 = 1 hour.
pub const FRESHNESS_WINDOW_SECS: u64 = 3_600;

/// Upper bound for a per-request `freshnessSecs` override (30 days).
pub const MAX_FRESHNESS_WINDOW_SECS: u64 = 30 * 24 * 3_600;

// ============================================================================
// Store
// ============================================================================

/// Total tries for an idempotent read while the store is unavailable.
pub const STORE_READ_RETRY_ATTEMPTS: u32 = 3;

/// First backoff between read retries (milliseconds), doubled each retry.
pub const STORE_READ_RETRY_BASE_MS: u64 = 50;

/// Maximum PostgreSQL pool size.
pub const DB_MAX_CONNECTIONS: u32 = 20;

/// Pool acquire timeout (seconds).
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Agent
// ============================================================================

/// HTTP client timeout for hub requests (seconds).
pub const AGENT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Base interval between configuration pulls (seconds). 300 = 5 minutes.
pub const AGENT_SYNC_INTERVAL_SECS: u64 = 300;

/// Random jitter added to the pull interval (seconds).
pub const AGENT_SYNC_JITTER_SECS: u64 = 30;

/// Maximum backoff multiplier exponent for pull retries.
///
/// `2^6 = 64x base interval`, capped at `AGENT_MAX_BACKOFF_SECS`.
pub const AGENT_MAX_BACKOFF_EXPONENT: u32 = 6;

/// Ceiling on the retry delay after consecutive failures (seconds).
pub const AGENT_MAX_BACKOFF_SECS: u64 = 1_800;

/// zstd level used for compressed configuration responses.
pub const ZSTD_LEVEL: i32 = 3;
