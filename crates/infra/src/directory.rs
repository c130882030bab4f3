//! Tenant and batch lookups owned by other subsystems.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use growledger_auth::Organization;
use growledger_core::{BatchId, TenantId};

use crate::store::StoreError;

/// Read-only view of organizations and batch ownership.
///
/// The batch id is opaque here; the only question asked is whether it
/// resolves inside the given tenant.
#[async_trait::async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn organization(&self, tenant_id: TenantId) -> Result<Option<Organization>, StoreError>;

    async fn batch_in_tenant(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<D> TenantDirectory for Arc<D>
where
    D: TenantDirectory + ?Sized,
{
    async fn organization(&self, tenant_id: TenantId) -> Result<Option<Organization>, StoreError> {
        (**self).organization(tenant_id).await
    }

    async fn batch_in_tenant(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<bool, StoreError> {
        (**self).batch_in_tenant(tenant_id, batch_id).await
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    organizations: RwLock<HashMap<TenantId, Organization>>,
    batches: RwLock<HashMap<BatchId, TenantId>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_organization(&self, org: Organization) -> Result<(), StoreError> {
        let mut orgs = self
            .organizations
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        orgs.insert(org.id, org);
        Ok(())
    }

    pub fn register_batch(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<(), StoreError> {
        let mut batches = self
            .batches
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        batches.insert(batch_id, tenant_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn organization(&self, tenant_id: TenantId) -> Result<Option<Organization>, StoreError> {
        let orgs = self
            .organizations
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(orgs.get(&tenant_id).cloned())
    }

    async fn batch_in_tenant(&self, tenant_id: TenantId, batch_id: BatchId) -> Result<bool, StoreError> {
        let batches = self
            .batches
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(batches.get(&batch_id) == Some(&tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use growledger_auth::PlanTier;

    #[tokio::test]
    async fn batches_resolve_only_in_their_tenant() {
        let dir = InMemoryTenantDirectory::new();
        let tenant = TenantId::new();
        let batch = BatchId::new();
        dir.register_batch(tenant, batch).unwrap();

        assert!(dir.batch_in_tenant(tenant, batch).await.unwrap());
        assert!(!dir.batch_in_tenant(TenantId::new(), batch).await.unwrap());
        assert!(!dir.batch_in_tenant(tenant, BatchId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn organizations_are_looked_up_by_tenant() {
        let dir = InMemoryTenantDirectory::new();
        let org = Organization::new(TenantId::new(), "Canopy Co", PlanTier::Pro);
        dir.upsert_organization(org.clone()).unwrap();

        assert_eq!(dir.organization(org.id).await.unwrap(), Some(org));
        assert_eq!(dir.organization(TenantId::new()).await.unwrap(), None);
    }
}
