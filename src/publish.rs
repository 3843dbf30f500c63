//! Publish Coordinator — the only writer of version rows
//!
//! Turns a candidate manifest into a new immutable, published version:
//!
//! 1. validate the payload (all violations reported at once)
//! 2. read the tenant's highest claimed version
//! 3. append a draft at `max + 1`
//! 4. on a uniqueness conflict, re-read and retry (bounded)
//! 5. flip the draft to published
//!
//! Numbers are claimed by optimistic append against the store's uniqueness
//! constraint, never from an in-process counter, so several hub instances can
//! publish for the same tenant without a distributed lock. A draft left behind
//! by a failed step 5 keeps its number; the next publish moves past it.

use crate::config::defaults::{HUB_MAX_PAYLOAD_BYTES, PUBLISH_MAX_ATTEMPTS};
use crate::error::HubError;
use crate::manifest::{validate_manifest, ValidationErrors};
use crate::store::{retry_read, HubStore, StoreError, VersionStore};
use crate::types::TenantConfigVersion;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct PublishCoordinator {
    store: Arc<dyn HubStore>,
    max_attempts: u32,
    max_payload_bytes: usize,
}

impl PublishCoordinator {
    pub fn new(store: Arc<dyn HubStore>) -> Self {
        Self {
            store,
            max_attempts: PUBLISH_MAX_ATTEMPTS,
            max_payload_bytes: HUB_MAX_PAYLOAD_BYTES,
        }
    }

    /// Override the conflict retry budget (at least one attempt is always made).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Validate `payload` and publish it as the tenant's next version.
    pub async fn publish(
        &self,
        tenant_id: &str,
        payload: serde_json::Value,
        author_id: &str,
    ) -> Result<TenantConfigVersion, HubError> {
        self.validate(tenant_id, &payload, author_id)?;

        for attempt in 1..=self.max_attempts {
            let current_max = retry_read("max_version", || self.store.max_version(tenant_id))
                .await
                .map_err(|source| publish_failed(tenant_id, source))?;
            let next = current_max.unwrap_or(0) + 1;

            match self
                .store
                .append_draft(tenant_id, next, &payload, author_id)
                .await
            {
                Ok(draft) => {
                    debug!(tenant_id, version = draft.version, attempt, "Draft version claimed");
                    return self.finish(tenant_id, draft.version).await;
                }
                Err(StoreError::Conflict { version, .. }) => {
                    warn!(tenant_id, version, attempt, "Version number taken by a concurrent publish, retrying");
                    tokio::task::yield_now().await;
                }
                Err(source) => return Err(publish_failed(tenant_id, source)),
            }
        }

        error!(tenant_id, attempts = self.max_attempts, "Publish gave up after repeated version conflicts");
        Err(HubError::ConcurrentPublish {
            tenant_id: tenant_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn validate(
        &self,
        tenant_id: &str,
        payload: &serde_json::Value,
        author_id: &str,
    ) -> Result<(), HubError> {
        let mut errors = validate_manifest(payload, self.max_payload_bytes)
            .err()
            .unwrap_or_default();
        if tenant_id.trim().is_empty() {
            errors
                .violations
                .extend(ValidationErrors::single("tenantId", "must not be empty").violations);
        }
        if author_id.trim().is_empty() {
            errors
                .violations
                .extend(ValidationErrors::single("authorId", "must not be empty").violations);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            warn!(tenant_id, violations = errors.len(), "Manifest rejected");
            Err(HubError::Validation(errors))
        }
    }

    async fn finish(&self, tenant_id: &str, version: i64) -> Result<TenantConfigVersion, HubError> {
        let published = self
            .store
            .mark_published(tenant_id, version)
            .await
            .map_err(|source| publish_failed(tenant_id, source))?;

        info!(
            tenant_id,
            version = published.version,
            author = %published.created_by,
            "Configuration version published"
        );
        Ok(published)
    }
}

fn publish_failed(tenant_id: &str, source: StoreError) -> HubError {
    error!(tenant_id, error = %source, "Publish failed in storage");
    HubError::PublishFailed {
        tenant_id: tenant_id.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn coordinator() -> (PublishCoordinator, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (PublishCoordinator::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_first_publish_is_version_one() {
        let (publisher, store) = coordinator();

        let row = publisher
            .publish("t1", json!({"theme": "dark"}), "alice")
            .await
            .unwrap();
        assert_eq!(row.version, 1);
        assert!(row.is_published());
        assert_eq!(row.created_by, "alice");

        let latest = store.get_latest_published("t1").await.unwrap().unwrap();
        assert_eq!(latest, row);
    }

    #[tokio::test]
    async fn test_publish_skips_abandoned_draft_numbers() {
        let (publisher, store) = coordinator();
        publisher.publish("t1", json!({"v": 1}), "alice").await.unwrap();
        // Simulates a publish that claimed 2 and died before publishing
        store.append_draft("t1", 2, &json!({"v": 2}), "bob").await.unwrap();

        let row = publisher.publish("t1", json!({"v": 3}), "alice").await.unwrap();
        assert_eq!(row.version, 3);
    }

    #[tokio::test]
    async fn test_validation_failure_writes_nothing() {
        let (publisher, store) = coordinator();
        let err = publisher
            .publish("t1", json!({}), "")
            .await
            .unwrap_err();

        match err {
            HubError::Validation(errors) => {
                let paths: Vec<&str> = errors.violations.iter().map(|v| v.path.as_str()).collect();
                assert_eq!(paths, vec!["/", "authorId"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(store.max_version("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_payload_limit_is_configurable() {
        let (publisher, _) = coordinator();
        let publisher = publisher.with_max_payload_bytes(8);
        let err = publisher
            .publish("t1", json!({"title": "far too long"}), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }
}
