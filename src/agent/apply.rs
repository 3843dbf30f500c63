//! Applying a fetched configuration locally
//!
//! The file applier writes the manifest atomically (temp file + rename) and
//! then records the applied version in a marker file next to it. The marker
//! is what the agent reports as `knownVersion` after a restart.

use crate::types::CurrentConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How far an apply got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The configuration is in place but its version could not be recorded
    MarkerNotWritten(String),
}

#[async_trait]
pub trait ConfigApplier: Send + Sync {
    /// Make `config` the active configuration.
    async fn apply(&self, config: &CurrentConfig) -> Result<ApplyOutcome, ApplyError>;

    /// Version currently applied, if known.
    async fn applied_version(&self) -> Option<i64>;
}

/// Writes the payload as JSON to `path` and the version to `<path>.version`.
#[derive(Debug, Clone)]
pub struct FileApplier {
    path: PathBuf,
    marker_path: PathBuf,
}

impl FileApplier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut marker = path.clone().into_os_string();
        marker.push(".version");
        Self {
            path,
            marker_path: PathBuf::from(marker),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let written = async {
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

#[async_trait]
impl ConfigApplier for FileApplier {
    async fn apply(&self, config: &CurrentConfig) -> Result<ApplyOutcome, ApplyError> {
        let json = serde_json::to_vec_pretty(&config.payload)?;
        write_atomic(&self.path, &json)
            .await
            .map_err(|source| ApplyError::Io {
                path: self.path.clone(),
                source,
            })?;

        if let Err(e) = write_atomic(&self.marker_path, config.version.to_string().as_bytes()).await {
            warn!(
                error = %e,
                path = %self.marker_path.display(),
                version = config.version,
                "Configuration applied but version marker not written"
            );
            return Ok(ApplyOutcome::MarkerNotWritten(format!(
                "version marker {}: {e}",
                self.marker_path.display()
            )));
        }

        info!(version = config.version, path = %self.path.display(), "Configuration applied");
        Ok(ApplyOutcome::Applied)
    }

    async fn applied_version(&self) -> Option<i64> {
        tokio::fs::read_to_string(&self.marker_path)
            .await
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(version: i64) -> CurrentConfig {
        CurrentConfig {
            version,
            payload: json!({"dashboards": [{"id": "main", "widgets": []}]}),
        }
    }

    #[tokio::test]
    async fn test_apply_writes_payload_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let applier = FileApplier::new(dir.path().join("conf/manifest.json"));
        assert_eq!(applier.applied_version().await, None);

        let outcome = applier.apply(&config(4)).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(applier.applied_version().await, Some(4));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(applier.path()).unwrap()).unwrap();
        assert_eq!(written, config(4).payload);
        assert!(!dir.path().join("conf/manifest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_marker_failure_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        let applier = FileApplier::new(dir.path().join("manifest.json"));
        // A directory where the marker file should go makes the rename fail
        std::fs::create_dir_all(applier.marker_path().join("occupied")).unwrap();

        let outcome = applier.apply(&config(2)).await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::MarkerNotWritten(_)));
        assert!(applier.path().exists());
        assert_eq!(applier.applied_version().await, None);
    }
}
