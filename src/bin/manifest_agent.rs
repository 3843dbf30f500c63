//! Manifest Agent — pulls a tenant's configuration from the hub
//!
//! Usage:
//!   manifest-agent --hub-url http://hub:8080 --tenant acme --apply-path /var/lib/viewer/manifest.json
//!   manifest-agent --hub-url http://hub:8080 --tenant acme --once

use clap::Parser;
use manifest_hub::agent::{run_config_sync, sync_once, AgentConfig, ConfigClient, FileApplier};
use manifest_hub::config::defaults::{AGENT_SYNC_INTERVAL_SECS, AGENT_SYNC_JITTER_SECS};
use manifest_hub::telemetry::{self, LogFormat};
use manifest_hub::types::SyncStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "manifest-agent", version, about = "Pull-based configuration sync agent")]
struct CliArgs {
    /// Hub base URL
    #[arg(long, env = "MANIFEST_HUB_URL")]
    hub_url: String,

    /// Tenant whose configuration to pull
    #[arg(long, env = "MANIFEST_AGENT_TENANT")]
    tenant: String,

    /// Stable agent identity (default: host name)
    #[arg(long, env = "MANIFEST_AGENT_ID")]
    agent_id: Option<String>,

    /// Where to write the applied manifest
    #[arg(long, env = "MANIFEST_AGENT_APPLY_PATH", default_value = "manifest.json")]
    apply_path: PathBuf,

    /// Base interval between pulls (seconds)
    #[arg(long, default_value_t = AGENT_SYNC_INTERVAL_SECS)]
    interval_secs: u64,

    /// Random jitter added to each interval (seconds)
    #[arg(long, default_value_t = AGENT_SYNC_JITTER_SECS)]
    jitter_secs: u64,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    telemetry::init_tracing(
        "info,manifest_hub=debug",
        LogFormat::from_env("MANIFEST_AGENT_LOG_FORMAT"),
    );

    let args = CliArgs::parse();

    let mut config = AgentConfig::new(&args.hub_url, &args.tenant, args.apply_path);
    if let Some(id) = args.agent_id {
        config = config.with_agent_id(id);
    }
    config.interval_secs = args.interval_secs;
    config.jitter_secs = args.jitter_secs;
    config.validate()?;

    let client = ConfigClient::new(&config)?;
    let applier = Arc::new(FileApplier::new(config.apply_path.clone()));

    info!(
        hub = %config.hub_url,
        tenant = %config.tenant_id,
        agent_id = %config.agent_id,
        path = %config.apply_path.display(),
        "Starting Manifest Agent"
    );

    if args.once {
        let cycle = sync_once(&client, applier.as_ref()).await;
        info!(
            status = %cycle.outcome.status,
            applied_version = cycle.outcome.applied_version,
            reported = cycle.reported,
            "Single sync cycle finished"
        );
        if cycle.outcome.status == SyncStatus::Failure {
            anyhow::bail!(
                "sync failed: {}",
                cycle.outcome.error_message.unwrap_or_default()
            );
        }
        return Ok(());
    }

    tokio::select! {
        () = run_config_sync(client, applier, config.interval_secs, config.jitter_secs) => {}
        () = shutdown_signal() => {}
    }

    info!("Manifest Agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutdown signal received");
}
