//! Error taxonomy for the versioning and distribution core

use crate::manifest::ValidationErrors;
use crate::store::StoreError;

/// Errors returned by the publish, distribution and rollout services.
///
/// Validation and state errors are deterministic and carry full detail for
/// the caller. `PublishFailed` and `Storage` are infrastructure failures and
/// are safe to retry from scratch.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("invalid manifest: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("concurrent publish for tenant '{tenant_id}' did not settle after {attempts} attempts")]
    ConcurrentPublish { tenant_id: String, attempts: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("tenant '{0}' has no published configuration")]
    NoPublishedConfig(String),

    #[error("publish failed for tenant '{tenant_id}': {source}")]
    PublishFailed {
        tenant_id: String,
        #[source]
        source: StoreError,
    },

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::InvalidState(what) => Self::InvalidState(what),
            other => Self::Storage(other),
        }
    }
}

impl HubError {
    /// Stable machine-readable code used in API error bodies.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ConcurrentPublish { .. } => "concurrent_publish",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::NoPublishedConfig(_) => "no_published_config",
            Self::PublishFailed { .. } => "publish_failed",
            Self::Storage(_) => "storage_unavailable",
        }
    }

    /// Whether the caller may simply retry the whole operation.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentPublish { .. } | Self::PublishFailed { .. } | Self::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_state_errors() {
        let err: HubError = StoreError::NotFound("t1/v9".to_string()).into();
        assert!(matches!(err, HubError::NotFound(_)));

        let err: HubError = StoreError::InvalidState("already published".to_string()).into();
        assert_eq!(err.code(), "invalid_state");
        assert!(!err.is_retryable());

        let err: HubError = StoreError::Unavailable("pool timed out".to_string()).into();
        assert_eq!(err.code(), "storage_unavailable");
        assert!(err.is_retryable());
    }
}
