//! Distribution — read-only pull surface for viewer agents
//!
//! Agents are intermittently connected, so the hub never pushes: each agent
//! asks for the tenant's latest published version on its own schedule. This
//! service never writes to the version store and may be called arbitrarily
//! often and concurrently.

use crate::error::HubError;
use crate::store::{retry_read, HubStore, VersionStore};
use crate::types::{CurrentConfig, TenantConfigVersion};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Distribution {
    store: Arc<dyn HubStore>,
}

impl Distribution {
    pub fn new(store: Arc<dyn HubStore>) -> Self {
        Self { store }
    }

    /// Return the tenant's latest published `(version, payload)`.
    pub async fn fetch_current(
        &self,
        tenant_id: &str,
        agent_version: &str,
    ) -> Result<CurrentConfig, HubError> {
        let latest = retry_read("get_latest_published", || {
            self.store.get_latest_published(tenant_id)
        })
        .await?;

        match latest {
            Some(row) => {
                debug!(tenant_id, agent_version, version = row.version, "Serving current configuration");
                Ok(row.into())
            }
            None => {
                debug!(tenant_id, agent_version, "Tenant has no published configuration");
                Err(HubError::NoPublishedConfig(tenant_id.to_string()))
            }
        }
    }

    /// One version row, draft or published.
    pub async fn get_version(
        &self,
        tenant_id: &str,
        version: i64,
    ) -> Result<TenantConfigVersion, HubError> {
        retry_read("get_by_version", || self.store.get_by_version(tenant_id, version))
            .await?
            .ok_or_else(|| HubError::NotFound(format!("version {version} of tenant {tenant_id}")))
    }

    /// A page of version history, newest first. Drafts left behind by failed
    /// publishes are included so gaps in the published sequence are explained.
    pub async fn history(
        &self,
        tenant_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<TenantConfigVersion>, HubError> {
        let rows = retry_read("list_history", || {
            self.store.list_history(tenant_id, limit, before)
        })
        .await?;
        debug!(tenant_id, limit, before, rows = rows.len(), "Version history read");
        Ok(rows)
    }
}
