use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use growledger_core::{ExpectedVersion, TenantId};
use growledger_inventory::{InventoryItem, InventoryItemId, InventoryMovement, ItemType};

use super::{InventoryStore, StoreError, check_commit_shape};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    tenant_id: TenantId,
    item_id: InventoryItemId,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemKey, InventoryItem>,
    ledgers: HashMap<ItemKey, Vec<InventoryMovement>>,
}

/// In-memory item/ledger store.
///
/// Intended for tests/dev. Items and ledgers share one lock, so every write
/// touching both is atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn collect_items(
        &self,
        tenant_id: TenantId,
        keep: impl Fn(&InventoryItem) -> bool,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let state = self.read()?;
        let mut items: Vec<InventoryItem> = state
            .items
            .iter()
            .filter(|(key, item)| key.tenant_id == tenant_id && keep(item))
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.as_uuid().cmp(a.id.0.as_uuid())));
        Ok(items)
    }
}

#[async_trait::async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_item(&self, item: &InventoryItem, opening: &InventoryMovement) -> Result<(), StoreError> {
        check_commit_shape(item, opening)?;
        if opening.sequence != 1 {
            return Err(StoreError::Invariant("opening movement must be sequence 1".to_string()));
        }

        let key = ItemKey {
            tenant_id: item.tenant_id,
            item_id: item.id,
        };
        let mut state = self.write()?;
        if state.items.keys().any(|k| k.item_id == item.id) {
            return Err(StoreError::Concurrency(format!("item {} already exists", item.id)));
        }
        state.items.insert(key, item.clone());
        state.ledgers.insert(key, vec![opening.clone()]);
        Ok(())
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let state = self.read()?;
        Ok(state.items.get(&ItemKey { tenant_id, item_id }).cloned())
    }

    async fn item_owner(&self, item_id: InventoryItemId) -> Result<Option<TenantId>, StoreError> {
        let state = self.read()?;
        Ok(state.items.keys().find(|k| k.item_id == item_id).map(|k| k.tenant_id))
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        self.collect_items(tenant_id, |_| true)
    }

    async fn list_items_by_type(
        &self,
        tenant_id: TenantId,
        item_type: ItemType,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        self.collect_items(tenant_id, |item| item.item_type == item_type)
    }

    async fn list_low_stock(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        self.collect_items(tenant_id, InventoryItem::is_low_stock)
    }

    async fn commit_movement(
        &self,
        item: &InventoryItem,
        movement: &InventoryMovement,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        check_commit_shape(item, movement)?;

        let key = ItemKey {
            tenant_id: item.tenant_id,
            item_id: item.id,
        };
        let mut state = self.write()?;
        let State { items, ledgers } = &mut *state;

        let Some(stored) = items.get_mut(&key) else {
            return Err(StoreError::Concurrency(format!("item {} no longer exists", item.id)));
        };
        if !expected.matches(stored.version) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected:?}, found {}",
                stored.version
            )));
        }
        if item.version != stored.version + 1 {
            return Err(StoreError::Invariant(format!(
                "item {} jumps from version {} to {}",
                item.id, stored.version, item.version
            )));
        }

        *stored = item.clone();
        ledgers.entry(key).or_default().push(movement.clone());
        Ok(())
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        let state = self.read()?;
        Ok(state
            .ledgers
            .get(&ItemKey { tenant_id, item_id })
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tenant_movements(&self, tenant_id: TenantId) -> Result<Vec<InventoryMovement>, StoreError> {
        let state = self.read()?;
        let mut all: Vec<InventoryMovement> = state
            .ledgers
            .iter()
            .filter(|(key, _)| key.tenant_id == tenant_id)
            .flat_map(|(_, ledger)| ledger.iter().cloned())
            .collect();
        all.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        Ok(all)
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<Option<u64>, StoreError> {
        let key = ItemKey { tenant_id, item_id };
        let mut state = self.write()?;
        if state.items.remove(&key).is_none() {
            return Ok(None);
        }
        let removed = state.ledgers.remove(&key).map(|l| l.len() as u64).unwrap_or(0);
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use growledger_core::UserId;
    use growledger_inventory::{MovementRequest, MovementType, NewItem, UnitOfMeasure, apply_movement, open_item};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    async fn seeded(store: &InMemoryInventoryStore, tenant_id: TenantId, qty: f64) -> InventoryItem {
        let new = NewItem::new("Living soil", ItemType::Substrate, UnitOfMeasure::Kilogram, qty).with_minimum(10.0);
        let (item, opening) = open_item(tenant_id, UserId::new(), new, Utc::now()).unwrap();
        store.insert_item(&item, &opening).await.unwrap();
        item
    }

    #[tokio::test]
    async fn reads_are_scoped_by_tenant() {
        let store = InMemoryInventoryStore::new();
        let tenant_a = test_tenant_id();
        let tenant_b = test_tenant_id();
        let item = seeded(&store, tenant_a, 50.0).await;

        assert!(store.get_item(tenant_a, item.id).await.unwrap().is_some());
        assert!(store.get_item(tenant_b, item.id).await.unwrap().is_none());
        assert!(store.list_items(tenant_b).await.unwrap().is_empty());
        assert!(store.list_movements(tenant_b, item.id).await.unwrap().is_empty());
        assert_eq!(store.item_owner(item.id).await.unwrap(), Some(tenant_a));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryInventoryStore::new();
        let tenant = test_tenant_id();
        let item = seeded(&store, tenant, 50.0).await;
        let actor = UserId::new();

        let (first, m1) =
            apply_movement(&item, &MovementRequest::new(MovementType::Usage, 5.0), actor, Utc::now()).unwrap();
        store.commit_movement(&first, &m1, ExpectedVersion::Exact(item.version)).await.unwrap();

        let (second, m2) =
            apply_movement(&item, &MovementRequest::new(MovementType::Usage, 7.0), actor, Utc::now()).unwrap();
        let err = store
            .commit_movement(&second, &m2, ExpectedVersion::Exact(item.version))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let ledger = store.list_movements(tenant, item.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(store.get_item(tenant, item.id).await.unwrap().unwrap().current_quantity, 45.0);
    }

    #[tokio::test]
    async fn low_stock_listing_is_strict() {
        let store = InMemoryInventoryStore::new();
        let tenant = test_tenant_id();
        seeded(&store, tenant, 10.0).await;
        let low = seeded(&store, tenant, 9.5).await;

        let listed = store.list_low_stock(tenant).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, low.id);
    }

    #[tokio::test]
    async fn delete_removes_item_and_ledger_together() {
        let store = InMemoryInventoryStore::new();
        let tenant = test_tenant_id();
        let item = seeded(&store, tenant, 3.0).await;

        assert_eq!(store.delete_item(test_tenant_id(), item.id).await.unwrap(), None);
        assert_eq!(store.delete_item(tenant, item.id).await.unwrap(), Some(1));
        assert!(store.get_item(tenant, item.id).await.unwrap().is_none());
        assert!(store.list_movements(tenant, item.id).await.unwrap().is_empty());
        assert!(store.list_tenant_movements(tenant).await.unwrap().is_empty());
    }
}
