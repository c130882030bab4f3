//! Pure ledger rules.
//!
//! Every function here takes a snapshot and returns the next one; nothing is
//! mutated in place, so a rejected change leaves no trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use growledger_core::{DomainError, DomainResult, MovementId, TenantId, UserId};

use crate::{InventoryItem, InventoryItemId, InventoryMovement, MovementRequest, MovementType, NewItem};

/// Notes attached to the implicit movement written at item creation.
pub const OPENING_NOTES: &str = "opening balance";

/// The balance arithmetic of a single movement.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub previous_quantity: f64,
    pub delta: f64,
    pub new_quantity: f64,
}

/// Result of replaying an item's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub item_id: InventoryItemId,
    pub entries: u64,
    pub opening_quantity: f64,
    pub net_change: f64,
    pub current_quantity: f64,
}

/// Build a new item and its opening PURCHASE movement.
pub fn open_item(
    tenant_id: TenantId,
    actor: UserId,
    new: NewItem,
    now: DateTime<Utc>,
) -> DomainResult<(InventoryItem, InventoryMovement)> {
    new.validate()?;
    let opening_cost = new.unit_cost.map(|c| c * new.initial_quantity);
    if opening_cost.is_some_and(|c| !c.is_finite()) {
        return Err(DomainError::validation("opening cost is out of range"));
    }

    let item = InventoryItem {
        id: InventoryItemId::new(),
        tenant_id,
        name: new.name.trim().to_string(),
        item_type: new.item_type,
        unit: new.unit,
        current_quantity: new.initial_quantity,
        minimum_quantity: new.minimum_quantity,
        batch_id: new.batch_id,
        unit_cost: new.unit_cost,
        details: new.details,
        created_by: actor,
        version: 1,
        created_at: now,
        updated_at: now,
    };

    let opening = InventoryMovement {
        id: MovementId::new(),
        tenant_id,
        item_id: item.id,
        movement_type: MovementType::Purchase,
        quantity: new.initial_quantity,
        previous_quantity: 0.0,
        new_quantity: new.initial_quantity,
        cost: opening_cost,
        batch_id: new.batch_id,
        notes: Some(OPENING_NOTES.to_string()),
        actor,
        sequence: 1,
        occurred_at: now,
    };

    Ok((item, opening))
}

/// Validate `request` against `item` and compute the resulting balance.
///
/// Fails with `InsufficientStock` when the balance would go negative and with
/// a validation error when it would leave the finite range.
pub fn plan_movement(item: &InventoryItem, request: &MovementRequest) -> DomainResult<StockChange> {
    request.validate()?;

    let delta = request.signed_quantity();
    let new_quantity = item.current_quantity + delta;
    if !new_quantity.is_finite() {
        return Err(DomainError::validation("resulting quantity is out of range"));
    }
    if new_quantity < 0.0 {
        return Err(DomainError::insufficient_stock(item.current_quantity, delta.abs()));
    }

    Ok(StockChange {
        previous_quantity: item.current_quantity,
        delta,
        new_quantity,
    })
}

/// Next item snapshot plus the ledger entry that explains it.
pub fn apply_movement(
    item: &InventoryItem,
    request: &MovementRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> DomainResult<(InventoryItem, InventoryMovement)> {
    let change = plan_movement(item, request)?;
    let sequence = item.version + 1;

    let mut updated = item.clone();
    updated.current_quantity = change.new_quantity;
    updated.version = sequence;
    updated.updated_at = now;

    let movement = InventoryMovement {
        id: MovementId::new(),
        tenant_id: item.tenant_id,
        item_id: item.id,
        movement_type: request.movement_type,
        quantity: change.delta,
        previous_quantity: change.previous_quantity,
        new_quantity: change.new_quantity,
        cost: request.cost,
        batch_id: request.batch_id,
        notes: request.notes.clone(),
        actor,
        sequence,
        occurred_at: now,
    };

    Ok((updated, movement))
}

/// Replay `movements` (in sequence order) and check them against `item`.
///
/// Comparisons are exact: every stored `new_quantity` was produced by the same
/// addition this replays.
pub fn verify_ledger(item: &InventoryItem, movements: &[InventoryMovement]) -> DomainResult<LedgerSummary> {
    let Some(first) = movements.first() else {
        return Err(DomainError::invariant(format!("item {} has no ledger entries", item.id)));
    };

    let mut running = 0.0_f64;
    for (index, m) in movements.iter().enumerate() {
        let expected_sequence = index as u64 + 1;

        if m.item_id != item.id || m.tenant_id != item.tenant_id {
            return Err(DomainError::invariant(format!(
                "movement {} does not belong to item {}",
                m.id, item.id
            )));
        }
        if m.sequence != expected_sequence {
            return Err(DomainError::invariant(format!(
                "item {}: expected sequence {expected_sequence}, found {}",
                item.id, m.sequence
            )));
        }
        if m.previous_quantity != running {
            return Err(DomainError::invariant(format!(
                "item {} entry {}: previous quantity {} does not match running balance {running}",
                item.id, m.sequence, m.previous_quantity
            )));
        }
        if m.new_quantity != m.previous_quantity + m.quantity {
            return Err(DomainError::invariant(format!(
                "item {} entry {}: {} + {} != {}",
                item.id, m.sequence, m.previous_quantity, m.quantity, m.new_quantity
            )));
        }
        running = m.new_quantity;
    }

    if running != item.current_quantity {
        return Err(DomainError::invariant(format!(
            "item {}: ledger balance {running} does not match current quantity {}",
            item.id, item.current_quantity
        )));
    }
    if movements.len() as u64 != item.version {
        return Err(DomainError::invariant(format!(
            "item {}: {} ledger entries but version {}",
            item.id,
            movements.len(),
            item.version
        )));
    }

    Ok(LedgerSummary {
        item_id: item.id,
        entries: movements.len() as u64,
        opening_quantity: first.new_quantity,
        net_change: running - first.new_quantity,
        current_quantity: running,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::{ItemType, UnitOfMeasure};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn fertilizer(initial: f64) -> (InventoryItem, InventoryMovement) {
        let new = NewItem::new("Bloom A", ItemType::Fertilizer, UnitOfMeasure::Liter, initial).with_unit_cost(2.5);
        open_item(test_tenant_id(), UserId::new(), new, Utc::now()).unwrap()
    }

    #[test]
    fn opening_movement_mirrors_initial_quantity() {
        let (item, opening) = fertilizer(100.0);
        assert_eq!(item.current_quantity, 100.0);
        assert_eq!(item.version, 1);
        assert_eq!(opening.movement_type, MovementType::Purchase);
        assert_eq!(opening.previous_quantity, 0.0);
        assert_eq!(opening.new_quantity, 100.0);
        assert_eq!(opening.cost, Some(250.0));
        assert_eq!(opening.notes.as_deref(), Some(OPENING_NOTES));
        assert_eq!(opening.sequence, 1);
    }

    #[test]
    fn usage_then_overdraw() {
        let (item, _) = fertilizer(100.0);
        let (item, m) = apply_movement(&item, &MovementRequest::new(MovementType::Usage, 30.0), UserId::new(), Utc::now())
            .unwrap();
        assert_eq!(m.quantity, -30.0);
        assert_eq!(item.current_quantity, 70.0);
        assert_eq!(item.version, 2);

        let err = plan_movement(&item, &MovementRequest::new(MovementType::Usage, 80.0)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(70.0, 80.0));
    }

    #[test]
    fn draining_to_exactly_zero_is_allowed() {
        let (item, _) = fertilizer(5.0);
        let change = plan_movement(&item, &MovementRequest::new(MovementType::Loss, -5.0)).unwrap();
        assert_eq!(change.new_quantity, 0.0);
    }

    #[test]
    fn balance_must_stay_finite() {
        let new = NewItem::new("Bulk substrate", ItemType::Substrate, UnitOfMeasure::Kilogram, f64::MAX);
        let (item, _) = open_item(test_tenant_id(), UserId::new(), new, Utc::now()).unwrap();

        let err = apply_movement(
            &item,
            &MovementRequest::new(MovementType::Purchase, f64::MAX),
            UserId::new(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let pricey = NewItem::new("Bulk substrate", ItemType::Substrate, UnitOfMeasure::Kilogram, f64::MAX)
            .with_unit_cost(2.0);
        assert!(matches!(
            open_item(test_tenant_id(), UserId::new(), pricey, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn verify_detects_tampering() {
        let (item, opening) = fertilizer(10.0);
        let (item, m2) =
            apply_movement(&item, &MovementRequest::new(MovementType::Sale, 4.0), UserId::new(), Utc::now()).unwrap();

        let summary = verify_ledger(&item, &[opening.clone(), m2.clone()]).unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.net_change, -4.0);

        let mut broken = m2.clone();
        broken.previous_quantity = 9.0;
        assert!(matches!(
            verify_ledger(&item, &[opening.clone(), broken]),
            Err(DomainError::InvariantViolation(_))
        ));

        let mut drifted = item.clone();
        drifted.current_quantity = 7.0;
        assert!(verify_ledger(&drifted, &[opening.clone(), m2]).is_err());

        assert!(verify_ledger(&item, &[opening]).is_err());
        assert!(verify_ledger(&item, &[]).is_err());
    }

    fn request() -> impl Strategy<Value = MovementRequest> {
        (prop::sample::select(MovementType::ALL.to_vec()), -500.0f64..500.0)
            .prop_filter("non-zero", |(_, q)| *q != 0.0)
            .prop_map(|(t, q)| MovementRequest::new(t, q))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence is attempted, accepted movements keep
        /// the balance non-negative and the projection equal to the ledger sum.
        #[test]
        fn projection_equals_ledger_sum(
            initial in 0.0f64..1_000.0,
            requests in prop::collection::vec(request(), 0..40)
        ) {
            let (mut item, opening) = fertilizer(initial);
            let mut ledger = vec![opening];
            let actor = UserId::new();

            for req in &requests {
                match apply_movement(&item, req, actor, Utc::now()) {
                    Ok((next, movement)) => {
                        item = next;
                        ledger.push(movement);
                    }
                    Err(DomainError::InsufficientStock { current, requested }) => {
                        prop_assert_eq!(current, item.current_quantity);
                        prop_assert!(current - requested < 0.0);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
                prop_assert!(item.current_quantity >= 0.0);
            }

            let sum = ledger.iter().fold(0.0_f64, |acc, m| acc + m.quantity);
            prop_assert_eq!(sum, item.current_quantity);
            prop_assert!(verify_ledger(&item, &ledger).is_ok());
        }
    }
}
