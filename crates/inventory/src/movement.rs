use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use growledger_core::{BatchId, DomainError, DomainResult, MovementId, TenantId, UserId};

use crate::InventoryItemId;
use crate::item::{impl_named_enum, non_negative};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    Donation,
    Production,
    Usage,
    Sale,
    Loss,
    Transfer,
    Adjustment,
}

impl_named_enum!(MovementType, "movement type", {
    Purchase => "PURCHASE",
    Donation => "DONATION",
    Production => "PRODUCTION",
    Usage => "USAGE",
    Sale => "SALE",
    Loss => "LOSS",
    Transfer => "TRANSFER",
    Adjustment => "ADJUSTMENT",
});

impl MovementType {
    /// Types that take stock out.
    pub fn is_outbound(self) -> bool {
        matches!(self, MovementType::Usage | MovementType::Sale | MovementType::Loss)
    }

    /// Signed delta for a caller-supplied quantity. The caller's sign is ignored.
    pub fn signed(self, raw_quantity: f64) -> f64 {
        if self.is_outbound() {
            -raw_quantity.abs()
        } else {
            raw_quantity.abs()
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub item_id: InventoryItemId,
    pub movement_type: MovementType,
    /// Signed delta.
    pub quantity: f64,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub cost: Option<f64>,
    pub batch_id: Option<BatchId>,
    pub notes: Option<String>,
    pub actor: UserId,
    /// 1-based position in the item's ledger.
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

/// A requested stock change, before sign normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub movement_type: MovementType,
    pub quantity: f64,
    pub cost: Option<f64>,
    pub batch_id: Option<BatchId>,
    pub notes: Option<String>,
}

impl MovementRequest {
    pub fn new(movement_type: MovementType, quantity: f64) -> Self {
        Self {
            movement_type,
            quantity,
            cost: None,
            batch_id: None,
            notes: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !self.quantity.is_finite() {
            return Err(DomainError::validation("quantity must be a finite number"));
        }
        if self.quantity == 0.0 {
            return Err(DomainError::validation("quantity cannot be zero"));
        }
        if let Some(cost) = self.cost {
            non_negative("cost", cost)?;
        }
        Ok(())
    }

    pub fn signed_quantity(&self) -> f64 {
        self.movement_type.signed(self.quantity)
    }
}
