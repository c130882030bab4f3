//! Inventory ledger domain.
//!
//! Items, their append-only movement ledger, and the pure rules that move one
//! to the next. No IO, no storage, no authorization: callers in
//! `growledger-infra` do that before and after.

pub mod events;
pub mod item;
pub mod ledger;
pub mod movement;

pub use events::{InventoryEvent, ItemCreated, ItemDeleted, LowStockReached, MovementRecorded};
pub use item::{InventoryItem, InventoryItemId, ItemDetails, ItemType, NewItem, UnitOfMeasure};
pub use ledger::{LedgerSummary, StockChange, apply_movement, open_item, plan_movement, verify_ledger};
pub use movement::{InventoryMovement, MovementRequest, MovementType};
