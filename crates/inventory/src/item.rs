use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use growledger_core::{AggregateId, AggregateRoot, BatchId, DomainError, DomainResult, TenantId, UserId};

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new() -> Self {
        Self(AggregateId::new())
    }
}

impl Default for InventoryItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

macro_rules! impl_named_enum {
    ($t:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($t::$variant => $name),+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($t::$variant),)+
                    other => Err(DomainError::validation(format!(concat!("unknown ", $what, " '{}'"), other))),
                }
            }
        }
    };
}

pub(crate) use impl_named_enum;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Seed,
    Fertilizer,
    Substrate,
    Supplement,
    Equipment,
    PlantActive,
    HarvestWet,
    HarvestDry,
    FinalProduct,
    Other,
}

impl_named_enum!(ItemType, "item type", {
    Seed => "SEED",
    Fertilizer => "FERTILIZER",
    Substrate => "SUBSTRATE",
    Supplement => "SUPPLEMENT",
    Equipment => "EQUIPMENT",
    PlantActive => "PLANT_ACTIVE",
    HarvestWet => "HARVEST_WET",
    HarvestDry => "HARVEST_DRY",
    FinalProduct => "FINAL_PRODUCT",
    Other => "OTHER",
});

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitOfMeasure {
    Unit,
    Gram,
    Kilogram,
    Liter,
    Milliliter,
    Package,
}

impl_named_enum!(UnitOfMeasure, "unit of measure", {
    Unit => "UNIT",
    Gram => "GRAM",
    Kilogram => "KILOGRAM",
    Liter => "LITER",
    Milliliter => "MILLILITER",
    Package => "PACKAGE",
});

/// Descriptive attributes with no bearing on the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub description: Option<String>,
    pub strain: Option<String>,
    pub brand: Option<String>,
    pub supplier: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub location: Option<String>,
}

/// Current-quantity record for one stock unit of a tenant.
///
/// `current_quantity` is a projection of the item's movements; only
/// [`crate::ledger`] produces new values of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub tenant_id: TenantId,
    pub name: String,
    pub item_type: ItemType,
    pub unit: UnitOfMeasure,
    pub current_quantity: f64,
    pub minimum_quantity: Option<f64>,
    pub batch_id: Option<BatchId>,
    pub unit_cost: Option<f64>,
    pub details: ItemDetails,
    pub created_by: UserId,
    /// Number of movements applied so far.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Strictly below the threshold; an item sitting exactly on it is fine.
    pub fn is_low_stock(&self) -> bool {
        match self.minimum_quantity {
            Some(min) => self.current_quantity < min,
            None => false,
        }
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub item_type: ItemType,
    pub unit: UnitOfMeasure,
    pub initial_quantity: f64,
    pub minimum_quantity: Option<f64>,
    pub batch_id: Option<BatchId>,
    pub unit_cost: Option<f64>,
    #[serde(default)]
    pub details: ItemDetails,
}

impl NewItem {
    pub fn new(name: impl Into<String>, item_type: ItemType, unit: UnitOfMeasure, initial_quantity: f64) -> Self {
        Self {
            name: name.into(),
            item_type,
            unit,
            initial_quantity,
            minimum_quantity: None,
            batch_id: None,
            unit_cost: None,
            details: ItemDetails::default(),
        }
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum_quantity = Some(minimum);
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_details(mut self, details: ItemDetails) -> Self {
        self.details = details;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        non_negative("initial quantity", self.initial_quantity)?;
        if let Some(min) = self.minimum_quantity {
            non_negative("minimum quantity", min)?;
        }
        if let Some(cost) = self.unit_cost {
            non_negative("unit cost", cost)?;
        }
        Ok(())
    }
}

pub(crate) fn non_negative(field: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() {
        return Err(DomainError::validation(format!("{field} must be a finite number")));
    }
    if value < 0.0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}
