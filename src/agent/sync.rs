//! Configuration sync cycle and background loop

use super::apply::{ApplyOutcome, ConfigApplier};
use super::client::{ConfigClient, FetchResult};
use crate::config::defaults::{AGENT_MAX_BACKOFF_EXPONENT, AGENT_MAX_BACKOFF_SECS};
use crate::types::{SyncOutcome, SyncReport, SyncStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What one cycle did and whether the hub answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: SyncOutcome,
    pub hub_reachable: bool,
    /// Whether the hub acknowledged the sync result
    pub reported: bool,
}

/// Pull, apply and report once.
pub async fn sync_once(client: &ConfigClient, applier: &dyn ConfigApplier) -> CycleReport {
    let started = Instant::now();
    let known = applier.applied_version().await;

    let (outcome, hub_reachable) = match client.fetch_current(known).await {
        Ok(FetchResult::NotModified) => {
            debug!(version = known, "Configuration unchanged");
            (
                SyncOutcome {
                    status: SyncStatus::Success,
                    agent_id: None,
                    applied_version: known,
                    duration_ms: elapsed_ms(started),
                    error_message: None,
                },
                true,
            )
        }
        Ok(FetchResult::Updated(config)) => {
            let version = config.version;
            let outcome = match applier.apply(&config).await {
                Ok(ApplyOutcome::Applied) => SyncOutcome::success(version, elapsed_ms(started)),
                Ok(ApplyOutcome::MarkerNotWritten(reason)) => SyncOutcome {
                    status: SyncStatus::Partial,
                    agent_id: None,
                    applied_version: Some(version),
                    duration_ms: elapsed_ms(started),
                    error_message: Some(reason),
                },
                Err(e) => SyncOutcome::failure(format!("apply failed: {e}"), elapsed_ms(started))
                    .with_applied_version(known),
            };
            (outcome, true)
        }
        Ok(FetchResult::NoPublishedConfig) => (
            SyncOutcome::failure("tenant has no published configuration", elapsed_ms(started)),
            true,
        ),
        Err(e) => (
            SyncOutcome::failure(format!("fetch failed: {e}"), elapsed_ms(started))
                .with_applied_version(known),
            !e.is_unreachable(),
        ),
    };
    let outcome = outcome.with_agent_id(client.agent_id());

    let report = SyncReport {
        tenant: Some(client.tenant_id().to_string()),
        agent_id: outcome.agent_id.clone(),
        agent_version: client.agent_version().to_string(),
        status: outcome.status,
        applied_version: outcome.applied_version,
        duration_ms: outcome.duration_ms,
        error_message: outcome.error_message.clone(),
    };
    let reported = match client.report_sync(&report).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, status = %report.status, "Failed to report sync result");
            false
        }
    };

    CycleReport {
        outcome,
        hub_reachable,
        reported,
    }
}

/// Delay before the next attempt after `consecutive_failures` unreachable cycles.
pub fn backoff_secs(interval_secs: u64, consecutive_failures: u32) -> u64 {
    let factor = 1u64 << consecutive_failures.min(AGENT_MAX_BACKOFF_EXPONENT);
    interval_secs.saturating_mul(factor).min(AGENT_MAX_BACKOFF_SECS)
}

/// Run the configuration sync background task
pub async fn run_config_sync(
    client: ConfigClient,
    applier: Arc<dyn ConfigApplier>,
    interval_secs: u64,
    jitter_secs: u64,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        let jitter = if jitter_secs > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(0..jitter_secs)
        } else {
            0
        };

        let cycle = sync_once(&client, applier.as_ref()).await;

        if cycle.hub_reachable {
            consecutive_failures = 0;
            info!(
                status = %cycle.outcome.status,
                applied_version = cycle.outcome.applied_version,
                duration_ms = cycle.outcome.duration_ms,
                "Config sync cycle complete"
            );
        } else {
            consecutive_failures = consecutive_failures.saturating_add(1);
            let delay = backoff_secs(interval_secs, consecutive_failures);
            warn!(
                hub = client.hub_url(),
                consecutive_failures,
                next_retry_secs = delay + jitter,
                "Hub unreachable, backing off"
            );
            tokio::time::sleep(Duration::from_secs(delay + jitter)).await;
            continue;
        }

        tokio::time::sleep(Duration::from_secs(interval_secs + jitter)).await;
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_secs(10, 1), 20);
        assert_eq!(backoff_secs(10, 3), 80);
        assert_eq!(backoff_secs(10, 6), 640);
        assert_eq!(backoff_secs(10, 40), 640);
        assert_eq!(backoff_secs(300, 4), AGENT_MAX_BACKOFF_SECS);
    }
}
