//! Tenant-scoped persistence for items and their ledgers.
//!
//! Every read takes the tenant as a query predicate. There is no unscoped
//! "load then check" path: the only tenant-agnostic lookup is
//! [`InventoryStore::item_owner`], which returns the owner and nothing else.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

use std::sync::Arc;

use thiserror::Error;

use growledger_core::{ExpectedVersion, TenantId};
use growledger_inventory::{InventoryItem, InventoryItemId, InventoryMovement, ItemType};

/// Persistence failure (as opposed to business-rule failures).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Compare-and-set lost against a concurrent writer.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Stored data violates a ledger invariant.
    #[error("stored data is corrupt: {0}")]
    Invariant(String),

    #[error("storage timed out: {0}")]
    Timeout(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Item + ledger persistence.
///
/// Writes are atomic: an item row and its ledger entry are committed together
/// or not at all.
#[async_trait::async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a new item together with its opening movement.
    async fn insert_item(&self, item: &InventoryItem, opening: &InventoryMovement) -> Result<(), StoreError>;

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError>;

    /// Owner of `item_id`, for audit logging of cross-tenant misses only.
    async fn item_owner(&self, item_id: InventoryItemId) -> Result<Option<TenantId>, StoreError>;

    /// Newest first.
    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError>;

    async fn list_items_by_type(
        &self,
        tenant_id: TenantId,
        item_type: ItemType,
    ) -> Result<Vec<InventoryItem>, StoreError>;

    /// Items with a minimum set and a current quantity strictly below it.
    async fn list_low_stock(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError>;

    /// Replace the item snapshot and append `movement` if the stored version
    /// still satisfies `expected`.
    async fn commit_movement(
        &self,
        item: &InventoryItem,
        movement: &InventoryMovement,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// One item's ledger in sequence order.
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<InventoryMovement>, StoreError>;

    /// Every movement of the tenant, newest first.
    async fn list_tenant_movements(&self, tenant_id: TenantId) -> Result<Vec<InventoryMovement>, StoreError>;

    /// Remove an item and its whole ledger in one unit.
    ///
    /// Returns the number of movements removed, or `None` if the item was not
    /// found in `tenant_id`.
    async fn delete_item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<Option<u64>, StoreError>;
}

#[async_trait::async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert_item(&self, item: &InventoryItem, opening: &InventoryMovement) -> Result<(), StoreError> {
        (**self).insert_item(item, opening).await
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        (**self).get_item(tenant_id, item_id).await
    }

    async fn item_owner(&self, item_id: InventoryItemId) -> Result<Option<TenantId>, StoreError> {
        (**self).item_owner(item_id).await
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_items(tenant_id).await
    }

    async fn list_items_by_type(
        &self,
        tenant_id: TenantId,
        item_type: ItemType,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_items_by_type(tenant_id, item_type).await
    }

    async fn list_low_stock(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        (**self).list_low_stock(tenant_id).await
    }

    async fn commit_movement(
        &self,
        item: &InventoryItem,
        movement: &InventoryMovement,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).commit_movement(item, movement, expected).await
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        (**self).list_movements(tenant_id, item_id).await
    }

    async fn list_tenant_movements(&self, tenant_id: TenantId) -> Result<Vec<InventoryMovement>, StoreError> {
        (**self).list_tenant_movements(tenant_id).await
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<Option<u64>, StoreError> {
        (**self).delete_item(tenant_id, item_id).await
    }
}

/// Checks shared by every backend before a movement is committed.
pub(crate) fn check_commit_shape(item: &InventoryItem, movement: &InventoryMovement) -> Result<(), StoreError> {
    if movement.tenant_id != item.tenant_id {
        return Err(StoreError::TenantIsolation(format!(
            "movement tenant {} does not match item tenant {}",
            movement.tenant_id, item.tenant_id
        )));
    }
    if movement.item_id != item.id {
        return Err(StoreError::Invariant(format!(
            "movement {} targets item {}, not {}",
            movement.id, movement.item_id, item.id
        )));
    }
    if movement.sequence != item.version || movement.new_quantity != item.current_quantity {
        return Err(StoreError::Invariant(format!(
            "movement {} (sequence {}, new quantity {}) does not produce item snapshot (version {}, quantity {})",
            movement.id, movement.sequence, movement.new_quantity, item.version, item.current_quantity
        )));
    }
    if item.current_quantity < 0.0 {
        return Err(StoreError::Invariant(format!("item {} would go negative", item.id)));
    }
    Ok(())
}
