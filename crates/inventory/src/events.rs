//! Facts published after an inventory change has been committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use growledger_core::{MovementId, TenantId, UserId};
use growledger_events::Event;

use crate::{InventoryItem, InventoryItemId, InventoryMovement, ItemType, MovementType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub name: String,
    pub item_type: ItemType,
    pub initial_quantity: f64,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub movement_id: MovementId,
    pub movement_type: MovementType,
    pub quantity: f64,
    pub new_quantity: f64,
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Emitted on the transition into low stock, not on every movement below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockReached {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub current_quantity: f64,
    pub minimum_quantity: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub movements_removed: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    MovementRecorded(MovementRecorded),
    LowStockReached(LowStockReached),
    ItemDeleted(ItemDeleted),
}

impl InventoryEvent {
    pub fn item_created(item: &InventoryItem) -> Self {
        InventoryEvent::ItemCreated(ItemCreated {
            tenant_id: item.tenant_id,
            item_id: item.id,
            name: item.name.clone(),
            item_type: item.item_type,
            initial_quantity: item.current_quantity,
            created_by: item.created_by,
            occurred_at: item.created_at,
        })
    }

    pub fn movement_recorded(movement: &InventoryMovement) -> Self {
        InventoryEvent::MovementRecorded(MovementRecorded {
            tenant_id: movement.tenant_id,
            item_id: movement.item_id,
            movement_id: movement.id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            new_quantity: movement.new_quantity,
            sequence: movement.sequence,
            occurred_at: movement.occurred_at,
        })
    }

    /// `Some` only when `after` is low on stock and `before` was not.
    pub fn low_stock_transition(before: &InventoryItem, after: &InventoryItem) -> Option<Self> {
        if before.is_low_stock() || !after.is_low_stock() {
            return None;
        }
        let minimum_quantity = after.minimum_quantity?;
        Some(InventoryEvent::LowStockReached(LowStockReached {
            tenant_id: after.tenant_id,
            item_id: after.id,
            current_quantity: after.current_quantity,
            minimum_quantity,
            occurred_at: after.updated_at,
        }))
    }

    pub fn item_deleted(item: &InventoryItem, movements_removed: u64, at: DateTime<Utc>) -> Self {
        InventoryEvent::ItemDeleted(ItemDeleted {
            tenant_id: item.tenant_id,
            item_id: item.id,
            movements_removed,
            occurred_at: at,
        })
    }

    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::ItemCreated(e) => e.item_id,
            InventoryEvent::MovementRecorded(e) => e.item_id,
            InventoryEvent::LowStockReached(e) => e.item_id,
            InventoryEvent::ItemDeleted(e) => e.item_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::MovementRecorded(_) => "inventory.movement.recorded",
            InventoryEvent::LowStockReached(_) => "inventory.item.low_stock",
            InventoryEvent::ItemDeleted(_) => "inventory.item.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::MovementRecorded(e) => e.occurred_at,
            InventoryEvent::LowStockReached(e) => e.occurred_at,
            InventoryEvent::ItemDeleted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{MovementRequest, NewItem, UnitOfMeasure, apply_movement, open_item};

    #[test]
    fn low_stock_fires_once_on_transition() {
        let new = NewItem::new("Perlite", ItemType::Substrate, UnitOfMeasure::Liter, 12.0).with_minimum(10.0);
        let (item, _) = open_item(TenantId::new(), UserId::new(), new, Utc::now()).unwrap();
        let actor = item.created_by;

        let (low, _) =
            apply_movement(&item, &MovementRequest::new(MovementType::Usage, 3.0), actor, Utc::now()).unwrap();
        let event = InventoryEvent::low_stock_transition(&item, &low).unwrap();
        assert_eq!(event.event_type(), "inventory.item.low_stock");

        let (lower, _) =
            apply_movement(&low, &MovementRequest::new(MovementType::Usage, 1.0), actor, Utc::now()).unwrap();
        assert!(InventoryEvent::low_stock_transition(&low, &lower).is_none());
    }

    #[test]
    fn event_names_are_stable() {
        let new = NewItem::new("Clones", ItemType::PlantActive, UnitOfMeasure::Unit, 4.0);
        let (item, opening) = open_item(TenantId::new(), UserId::new(), new, Utc::now()).unwrap();

        assert_eq!(InventoryEvent::item_created(&item).event_type(), "inventory.item.created");
        assert_eq!(InventoryEvent::movement_recorded(&opening).event_type(), "inventory.movement.recorded");
        assert_eq!(
            InventoryEvent::item_deleted(&item, 1, Utc::now()).event_type(),
            "inventory.item.deleted"
        );
        assert_eq!(InventoryEvent::item_created(&item).item_id(), item.id);
    }
}
