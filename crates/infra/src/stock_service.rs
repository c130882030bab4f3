//! Stock mutation service: the inventory ledger's application layer.
//!
//! ```text
//! request
//!   ↓
//! 1. authorize (role, then plan where gated)
//!   ↓
//! 2. load the item scoped to the caller's tenant
//!   ↓
//! 3. validate + compute the next balance (pure, in growledger-inventory)
//!   ↓
//! 4. compare-and-set commit of item + movement (retried on conflict)
//!   ↓
//! 5. publish events (best effort, after commit)
//! ```

use chrono::Utc;
use tracing::instrument;

use growledger_auth::{Action, AuthzError, Feature, RequestContext, check, check_gated};
use growledger_core::{BatchId, ExpectedVersion};
use growledger_events::{Event, EventBus, EventEnvelope};
use growledger_inventory::{
    InventoryEvent, InventoryItem, InventoryItemId, InventoryMovement, ItemType, LedgerSummary, MovementRequest,
    NewItem, apply_movement, open_item, verify_ledger,
};

use crate::config::InfraConfig;
use crate::directory::TenantDirectory;
use crate::error::ServiceError;
use crate::store::{InventoryStore, StoreError};

/// Envelope type published on the bus.
pub type InventoryEnvelope = EventEnvelope<InventoryEvent>;

const AGGREGATE_TYPE: &str = "inventory_item";

/// Outcome of a recorded movement.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementResult {
    pub item: InventoryItem,
    pub movement: InventoryMovement,
}

/// Orchestrates authorization, ledger rules, persistence and publication.
///
/// Every operation takes a [`RequestContext`]; there is no way to call in
/// without a resolved tenant and actor.
#[derive(Debug)]
pub struct StockMutationService<S, D, B> {
    store: S,
    directory: D,
    bus: B,
    commit_retries: u32,
}

impl<S, D, B> StockMutationService<S, D, B>
where
    S: InventoryStore,
    D: TenantDirectory,
    B: EventBus<InventoryEnvelope>,
{
    pub fn new(store: S, directory: D, bus: B, config: &InfraConfig) -> Self {
        Self {
            store,
            directory,
            bus,
            commit_retries: config.commit_retries.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an item with its opening PURCHASE movement.
    ///
    /// Requires `manage-inventory`, membership of the tenant, and a plan that
    /// includes inventory management.
    #[instrument(skip(self, ctx, new), fields(tenant_id = %ctx.tenant_id(), user_id = %ctx.actor().user_id))]
    pub async fn create_item(&self, ctx: &RequestContext, new: NewItem) -> Result<InventoryItem, ServiceError> {
        check(ctx, Action::ManageInventory)?;

        let tenant_id = ctx.tenant_id();
        let actor = ctx.actor();
        if !actor.belongs_to(tenant_id) {
            tracing::warn!("item creation by an actor outside the organization refused");
            return Err(ServiceError::Forbidden(AuthzError::rejected(
                "items can only be created by members of the organization",
            )));
        }

        let org = self
            .directory
            .organization(tenant_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated(format!("unknown organization {tenant_id}")))?;
        check_gated(ctx, &org, Action::ManageInventory, Feature::InventoryManagement)?;

        if let Some(batch_id) = new.batch_id {
            self.ensure_batch(ctx, batch_id).await?;
        }

        let (item, opening) = open_item(tenant_id, actor.user_id, new, Utc::now())?;
        self.store.insert_item(&item, &opening).await?;

        tracing::info!(item_id = %item.id, name = %item.name, quantity = item.current_quantity, "inventory item created");
        self.publish(ctx, InventoryEvent::item_created(&item), item.version);
        self.publish(ctx, InventoryEvent::movement_recorded(&opening), opening.sequence);
        Ok(item)
    }

    /// Append one movement and update the item's balance atomically.
    ///
    /// The read/compute/commit cycle is retried on version conflicts, up to the
    /// configured number of attempts; each attempt re-validates the balance.
    #[instrument(
        skip(self, ctx, request),
        fields(
            tenant_id = %ctx.tenant_id(),
            item_id = %item_id,
            movement_type = %request.movement_type
        )
    )]
    pub async fn record_movement(
        &self,
        ctx: &RequestContext,
        item_id: InventoryItemId,
        request: MovementRequest,
    ) -> Result<MovementResult, ServiceError> {
        check(ctx, Action::ManageInventory)?;
        request.validate()?;
        if let Some(batch_id) = request.batch_id {
            self.ensure_batch(ctx, batch_id).await?;
        }

        for attempt in 1..=self.commit_retries {
            let current = self.load_scoped(ctx, item_id).await?;
            let (updated, movement) = apply_movement(&current, &request, ctx.actor().user_id, Utc::now())
                .inspect_err(|e| tracing::info!(error = %e, "movement rejected"))?;

            match self
                .store
                .commit_movement(&updated, &movement, ExpectedVersion::Exact(current.version))
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        sequence = movement.sequence,
                        quantity = movement.quantity,
                        new_quantity = movement.new_quantity,
                        attempt,
                        "movement recorded"
                    );
                    self.publish(ctx, InventoryEvent::movement_recorded(&movement), movement.sequence);
                    if let Some(low) = InventoryEvent::low_stock_transition(&current, &updated) {
                        tracing::info!(minimum = ?updated.minimum_quantity, "item reached low stock");
                        self.publish(ctx, low, movement.sequence);
                    }
                    return Ok(MovementResult {
                        item: updated,
                        movement,
                    });
                }
                Err(StoreError::Concurrency(reason)) => {
                    tracing::debug!(attempt, %reason, "movement commit lost a race; retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::warn!(attempts = self.commit_retries, "giving up on contended item");
        Err(ServiceError::Contention {
            attempts: self.commit_retries,
        })
    }

    /// Delete an item and its whole ledger. Returns the number of movements removed.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), item_id = %item_id))]
    pub async fn delete_item(&self, ctx: &RequestContext, item_id: InventoryItemId) -> Result<u64, ServiceError> {
        check(ctx, Action::ManageInventory)?;
        let item = self.load_scoped(ctx, item_id).await?;

        let Some(removed) = self.store.delete_item(ctx.tenant_id(), item_id).await? else {
            return Err(ServiceError::NotFound("item"));
        };

        tracing::info!(movements_removed = removed, "inventory item deleted");
        self.publish(
            ctx,
            InventoryEvent::item_deleted(&item, removed, Utc::now()),
            item.version + 1,
        );
        Ok(removed)
    }

    pub async fn get_item(&self, ctx: &RequestContext, item_id: InventoryItemId) -> Result<InventoryItem, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        self.load_scoped(ctx, item_id).await
    }

    /// Every item of the tenant, newest first.
    pub async fn list_items(&self, ctx: &RequestContext) -> Result<Vec<InventoryItem>, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        Ok(self.store.list_items(ctx.tenant_id()).await?)
    }

    pub async fn list_by_type(
        &self,
        ctx: &RequestContext,
        item_type: ItemType,
    ) -> Result<Vec<InventoryItem>, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        Ok(self.store.list_items_by_type(ctx.tenant_id(), item_type).await?)
    }

    pub async fn list_low_stock(&self, ctx: &RequestContext) -> Result<Vec<InventoryItem>, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        Ok(self.store.list_low_stock(ctx.tenant_id()).await?)
    }

    /// One item's ledger, oldest entry first.
    pub async fn list_movements(
        &self,
        ctx: &RequestContext,
        item_id: InventoryItemId,
    ) -> Result<Vec<InventoryMovement>, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        self.load_scoped(ctx, item_id).await?;
        Ok(self.store.list_movements(ctx.tenant_id(), item_id).await?)
    }

    /// Every movement of the tenant, newest first.
    pub async fn list_all_movements_for_tenant(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<InventoryMovement>, ServiceError> {
        check(ctx, Action::ViewInventory)?;
        Ok(self.store.list_tenant_movements(ctx.tenant_id()).await?)
    }

    /// Replay the item's ledger and check it against the stored balance.
    ///
    /// A mismatch is reported as `InvariantViolation` and left untouched.
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id(), item_id = %item_id))]
    pub async fn verify_item_ledger(
        &self,
        ctx: &RequestContext,
        item_id: InventoryItemId,
    ) -> Result<LedgerSummary, ServiceError> {
        check(ctx, Action::ViewInventory)?;

        for _ in 0..self.commit_retries {
            let item = self.load_scoped(ctx, item_id).await?;
            let movements = self.store.list_movements(ctx.tenant_id(), item_id).await?;
            let settled = self.load_scoped(ctx, item_id).await?;
            if settled.version != item.version {
                // A movement landed between the two reads.
                continue;
            }

            return verify_ledger(&item, &movements).map_err(|e| {
                tracing::error!(error = %e, "inventory ledger is inconsistent");
                ServiceError::from(e)
            });
        }

        Err(ServiceError::Contention {
            attempts: self.commit_retries,
        })
    }

    /// Tenant-scoped load. A miss is checked against the owner only to log
    /// cross-tenant probes distinctly; the caller sees "not found" either way.
    async fn load_scoped(&self, ctx: &RequestContext, item_id: InventoryItemId) -> Result<InventoryItem, ServiceError> {
        let tenant_id = ctx.tenant_id();
        if let Some(item) = self.store.get_item(tenant_id, item_id).await? {
            return Ok(item);
        }

        match self.store.item_owner(item_id).await? {
            Some(owner) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    owner_tenant_id = %owner,
                    item_id = %item_id,
                    user_id = %ctx.actor().user_id,
                    "cross-tenant item access refused"
                );
                Err(ServiceError::CrossTenantAccess)
            }
            None => Err(ServiceError::NotFound("item")),
        }
    }

    async fn ensure_batch(&self, ctx: &RequestContext, batch_id: BatchId) -> Result<(), ServiceError> {
        if self.directory.batch_in_tenant(ctx.tenant_id(), batch_id).await? {
            Ok(())
        } else {
            tracing::warn!(tenant_id = %ctx.tenant_id(), batch_id = %batch_id, "batch does not resolve in tenant");
            Err(ServiceError::NotFound("batch"))
        }
    }

    fn publish(&self, ctx: &RequestContext, event: InventoryEvent, sequence: u64) {
        let event_type = event.event_type();
        let envelope = EventEnvelope::wrap(ctx.tenant_id(), event.item_id().0, AGGREGATE_TYPE, sequence, event);
        if let Err(err) = self.bus.publish(envelope) {
            tracing::warn!(event_type, error = ?err, "failed to publish inventory event");
        }
    }
}
