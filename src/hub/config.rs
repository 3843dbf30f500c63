//! Hub configuration — defaults, optional TOML file, environment, CLI args
//!
//! Precedence (lowest to highest): built-in defaults, `--config` TOML file,
//! environment variables, CLI flags.
//!
//! | Variable                             | Field                   |
//! |--------------------------------------|-------------------------|
//! | `DATABASE_URL`                       | `database_url`          |
//! | `MANIFEST_HUB_BIND_ADDRESS`          | `bind_address`          |
//! | `MANIFEST_HUB_MAX_PAYLOAD_SIZE`      | `max_payload_size`      |
//! | `MANIFEST_HUB_REQUEST_TIMEOUT`       | `request_timeout_secs`  |
//! | `MANIFEST_HUB_FRESHNESS_SECS`        | `freshness_window_secs` |
//! | `MANIFEST_HUB_PUBLISH_MAX_ATTEMPTS`  | `publish_max_attempts`  |
//!
//! The log format (`MANIFEST_HUB_LOG_FORMAT`) is read by [`crate::telemetry`]
//! before configuration loads, so load warnings reach the chosen output.

use crate::config::defaults::{
    FRESHNESS_WINDOW_SECS, HISTORY_DEFAULT_LIMIT, HISTORY_MAX_LIMIT, HUB_BIND_ADDRESS,
    HUB_MAX_PAYLOAD_BYTES, HUB_REQUEST_TIMEOUT_SECS, MAX_FRESHNESS_WINDOW_SECS, PUBLISH_MAX_ATTEMPTS,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Manifest Hub configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// PostgreSQL connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Maximum manifest size in bytes (default: 1 MB)
    pub max_payload_size: usize,
    /// Service-level timeout applied to every request
    pub request_timeout_secs: u64,
    /// Agents silent for longer than this are classified `unknown`
    pub freshness_window_secs: u64,
    /// Conflict retry budget for a single publish
    pub publish_max_attempts: u32,
    /// Version history page size when no `limit` is given
    pub history_default_limit: usize,
    /// Largest version history page a caller may request
    pub history_max_limit: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_address: HUB_BIND_ADDRESS.to_string(),
            max_payload_size: HUB_MAX_PAYLOAD_BYTES,
            request_timeout_secs: HUB_REQUEST_TIMEOUT_SECS,
            freshness_window_secs: FRESHNESS_WINDOW_SECS,
            publish_max_attempts: PUBLISH_MAX_ATTEMPTS,
            history_default_limit: HISTORY_DEFAULT_LIMIT,
            history_max_limit: HISTORY_MAX_LIMIT,
        }
    }
}

impl HubConfig {
    /// Load configuration from an optional file, the process environment and
    /// CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        database_url: Option<String>,
        bind_address: Option<String>,
        port: Option<u16>,
    ) -> Result<Self, ConfigLoadError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());

        // CLI: --database-url, then --bind-address or --port
        if let Some(url) = database_url {
            config.database_url = Some(url);
        }
        if let Some(addr) = bind_address {
            config.bind_address = addr;
        } else if let Some(p) = port {
            config.bind_address = format!("0.0.0.0:{p}");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides through `lookup`. Unparseable values are
    /// ignored with a warning and the previous value is kept.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(addr) = lookup("MANIFEST_HUB_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        override_parsed(&lookup, "MANIFEST_HUB_MAX_PAYLOAD_SIZE", &mut self.max_payload_size);
        override_parsed(&lookup, "MANIFEST_HUB_REQUEST_TIMEOUT", &mut self.request_timeout_secs);
        override_parsed(&lookup, "MANIFEST_HUB_FRESHNESS_SECS", &mut self.freshness_window_secs);
        override_parsed(
            &lookup,
            "MANIFEST_HUB_PUBLISH_MAX_ATTEMPTS",
            &mut self.publish_max_attempts,
        );
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let mut problems = Vec::new();

        if self.bind_address.trim().is_empty() {
            problems.push("bind_address must not be empty".to_string());
        }
        if self.max_payload_size == 0 {
            problems.push("max_payload_size must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            problems.push("request_timeout_secs must be greater than 0".to_string());
        }
        if self.freshness_window_secs == 0 || self.freshness_window_secs > MAX_FRESHNESS_WINDOW_SECS {
            problems.push(format!(
                "freshness_window_secs must be between 1 and {MAX_FRESHNESS_WINDOW_SECS}"
            ));
        }
        if self.publish_max_attempts == 0 {
            problems.push("publish_max_attempts must be at least 1".to_string());
        }
        if self.history_default_limit == 0 || self.history_default_limit > self.history_max_limit {
            problems.push(format!(
                "history_default_limit must be between 1 and history_max_limit ({})",
                self.history_max_limit
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigLoadError::Invalid(problems.join("; ")))
        }
    }

    /// Clamp a caller-supplied history page size into the configured range.
    pub fn history_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.history_default_limit)
            .clamp(1, self.history_max_limit)
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.max_payload_size, 1_048_576);
        assert_eq!(config.freshness_window_secs, 3_600);
        assert_eq!(config.publish_max_attempts, 5);
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_and_bad_values() {
        let mut config = HubConfig::default();
        config.apply_env(env(&[
            ("DATABASE_URL", "postgres://hub@db/manifests"),
            ("MANIFEST_HUB_FRESHNESS_SECS", "900"),
            ("MANIFEST_HUB_PUBLISH_MAX_ATTEMPTS", "many"),
        ]));

        assert_eq!(config.database_url.as_deref(), Some("postgres://hub@db/manifests"));
        assert_eq!(config.freshness_window_secs, 900);
        assert_eq!(config.publish_max_attempts, 5);
    }

    #[test]
    fn test_cli_port_override() {
        let config = HubConfig::load(None, Some("postgres://test".to_string()), None, Some(9090))
            .expect("load should succeed");
        assert_eq!(config.database_url.as_deref(), Some("postgres://test"));
        assert_eq!(config.bind_address, "0.0.0.0:9090");
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(
            &path,
            "bind_address = \"127.0.0.1:7000\"\nfreshness_window_secs = 120\n",
        )
        .unwrap();

        let config = HubConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:7000");
        assert_eq!(config.freshness_window_secs, 120);
        assert_eq!(config.max_payload_size, 1_048_576);

        std::fs::write(&path, "bind_adress = \"typo\"\n").unwrap();
        assert!(matches!(
            HubConfig::from_file(&path),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation_collects_problems() {
        let config = HubConfig {
            publish_max_attempts: 0,
            history_default_limit: 1_000,
            ..HubConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("publish_max_attempts"));
        assert!(err.contains("history_default_limit"));
    }

    #[test]
    fn test_history_limit_clamps() {
        let config = HubConfig::default();
        assert_eq!(config.history_limit(None), 50);
        assert_eq!(config.history_limit(Some(0)), 1);
        assert_eq!(config.history_limit(Some(10_000)), 500);
    }
}
