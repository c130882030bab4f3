//! Postgres-backed item/ledger store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check violation) | `23514` | `Invariant` |
//! | Database (other) | any | `Backend` |
//! | PoolTimedOut | n/a | `Timeout` |
//! | Other | n/a | `Backend` |
//!
//! Schema lives in `migrations/0001_inventory_ledger.sql`; movements reference
//! their item with `ON DELETE CASCADE`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use growledger_core::{AggregateId, BatchId, ExpectedVersion, MovementId, TenantId, UserId};
use growledger_inventory::{InventoryItem, InventoryItemId, InventoryMovement, ItemDetails, ItemType, MovementType};

use super::{InventoryStore, StoreError, check_commit_shape};
use crate::config::InfraConfig;

const MIGRATION: &str = include_str!("../../migrations/0001_inventory_ledger.sql");

const ITEM_COLUMNS: &str = "id, tenant_id, name, item_type, unit, current_quantity, minimum_quantity, batch_id, \
     unit_cost, description, strain, brand, supplier, expiration_date, location, created_by, version, \
     created_at, updated_at";

const LOCK_ITEM_SQL: &str = "SELECT id FROM inventory_items WHERE tenant_id = $1 AND id = $2 FOR UPDATE";

const MOVEMENT_COLUMNS: &str = "id, tenant_id, item_id, movement_type, quantity, previous_quantity, new_quantity, \
     cost, batch_id, notes, actor, sequence, occurred_at";

/// Postgres-backed [`InventoryStore`].
///
/// Every query carries `tenant_id` in its WHERE clause. Movements are
/// committed with a compare-and-set on the item's `version` inside the same
/// transaction as the ledger insert.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool using the configured URL and limits.
    pub async fn connect(config: &InfraConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("no database url configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn fetch_items(
        &self,
        operation: &str,
        sql: &str,
        tenant_id: TenantId,
        item_type: Option<ItemType>,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let mut query = sqlx::query(sql).bind(tenant_id.as_uuid());
        if let Some(t) = item_type {
            query = query.bind(t.as_str());
        }
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter().map(item_from_row).collect()
    }
}

#[async_trait::async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, item, opening), fields(tenant_id = %item.tenant_id, item_id = %item.id), err)]
    async fn insert_item(&self, item: &InventoryItem, opening: &InventoryMovement) -> Result<(), StoreError> {
        check_commit_shape(item, opening)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, tenant_id, name, item_type, unit, current_quantity, minimum_quantity, batch_id,
                unit_cost, description, strain, brand, supplier, expiration_date, location, created_by,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(item.id.0.as_uuid())
        .bind(item.tenant_id.as_uuid())
        .bind(&item.name)
        .bind(item.item_type.as_str())
        .bind(item.unit.as_str())
        .bind(item.current_quantity)
        .bind(item.minimum_quantity)
        .bind(item.batch_id.map(|b| *b.as_uuid()))
        .bind(item.unit_cost)
        .bind(&item.details.description)
        .bind(&item.details.strain)
        .bind(&item.details.brand)
        .bind(&item.details.supplier)
        .bind(item.details.expiration_date)
        .bind(&item.details.location)
        .bind(item.created_by.as_uuid())
        .bind(item.version as i64)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        insert_movement(&mut tx, opening).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(item_id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn item_owner(&self, item_id: InventoryItemId) -> Result<Option<TenantId>, StoreError> {
        let row = sqlx::query("SELECT tenant_id FROM inventory_items WHERE id = $1")
            .bind(item_id.0.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("item_owner", e))?;

        match row {
            Some(row) => {
                let tenant: Uuid = row
                    .try_get("tenant_id")
                    .map_err(|e| StoreError::Backend(format!("failed to read tenant_id: {e}")))?;
                Ok(Some(TenantId::from_uuid(tenant)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE tenant_id = $1 ORDER BY created_at DESC, id DESC"
        );
        self.fetch_items("list_items", &sql, tenant_id, None).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_type = %item_type), err)]
    async fn list_items_by_type(
        &self,
        tenant_id: TenantId,
        item_type: ItemType,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE tenant_id = $1 AND item_type = $2 \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_items("list_items_by_type", &sql, tenant_id, Some(item_type)).await
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_low_stock(&self, tenant_id: TenantId) -> Result<Vec<InventoryItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE tenant_id = $1 AND minimum_quantity IS NOT NULL AND current_quantity < minimum_quantity \
             ORDER BY created_at DESC, id DESC"
        );
        self.fetch_items("list_low_stock", &sql, tenant_id, None).await
    }

    #[instrument(
        skip(self, item, movement),
        fields(
            tenant_id = %item.tenant_id,
            item_id = %item.id,
            sequence = movement.sequence,
            expected_version = ?expected
        ),
        err
    )]
    async fn commit_movement(
        &self,
        item: &InventoryItem,
        movement: &InventoryMovement,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        check_commit_shape(item, movement)?;

        let expected_version: Option<i64> = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE inventory_items
            SET current_quantity = $4, version = $5, updated_at = $6
            WHERE tenant_id = $1
                AND id = $2
                AND ($3::BIGINT IS NULL OR version = $3)
                AND version + 1 = $5
            "#,
        )
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.0.as_uuid())
        .bind(expected_version)
        .bind(item.current_quantity)
        .bind(item.version as i64)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        if updated.rows_affected() == 0 {
            let conflict = Err(StoreError::Concurrency(format!(
                "item {} is no longer at {expected:?}",
                item.id
            )));
            return settle_rollback(conflict, tx.rollback().await);
        }

        insert_movement(&mut tx, movement).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
    ) -> Result<Vec<InventoryMovement>, StoreError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE tenant_id = $1 AND item_id = $2 ORDER BY sequence ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(item_id.0.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_tenant_movements(&self, tenant_id: TenantId) -> Result<Vec<InventoryMovement>, StoreError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE tenant_id = $1 ORDER BY occurred_at DESC, sequence DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenant_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn delete_item(&self, tenant_id: TenantId, item_id: InventoryItemId) -> Result<Option<u64>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock first: commits queue behind it and then miss the deleted row.
        let locked = sqlx::query(LOCK_ITEM_SQL)
            .bind(tenant_id.as_uuid())
            .bind(item_id.0.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        if locked.is_none() {
            return settle_rollback(Ok(None), tx.rollback().await);
        }

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory_movements WHERE tenant_id = $1 AND item_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.0.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;

        sqlx::query("DELETE FROM inventory_items WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(item_id.0.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(count as u64))
    }
}

async fn insert_movement(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    m: &InventoryMovement,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, tenant_id, item_id, movement_type, quantity, previous_quantity, new_quantity,
            cost, batch_id, notes, actor, sequence, occurred_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(m.id.as_uuid())
    .bind(m.tenant_id.as_uuid())
    .bind(m.item_id.0.as_uuid())
    .bind(m.movement_type.as_str())
    .bind(m.quantity)
    .bind(m.previous_quantity)
    .bind(m.new_quantity)
    .bind(m.cost)
    .bind(m.batch_id.map(|b| *b.as_uuid()))
    .bind(&m.notes)
    .bind(m.actor.as_uuid())
    .bind(m.sequence as i64)
    .bind(m.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

/// Return `outcome` whatever the rollback did. A failed rollback is logged;
/// the server discards the transaction once the connection drops it.
fn settle_rollback<T>(outcome: Result<T, StoreError>, rollback: Result<(), sqlx::Error>) -> Result<T, StoreError> {
    if let Err(err) = rollback {
        warn!(error = %err, "rollback failed");
    }
    outcome
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Concurrency(msg),
                Some("23514") => StoreError::Invariant(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout(format!("connection pool timed out in {operation}")),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    item_type: String,
    unit: String,
    current_quantity: f64,
    minimum_quantity: Option<f64>,
    batch_id: Option<Uuid>,
    unit_cost: Option<f64>,
    description: Option<String>,
    strain: Option<String>,
    brand: Option<String>,
    supplier: Option<String>,
    expiration_date: Option<NaiveDate>,
    location: Option<String>,
    created_by: Uuid,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            item_type: row.try_get("item_type")?,
            unit: row.try_get("unit")?,
            current_quantity: row.try_get("current_quantity")?,
            minimum_quantity: row.try_get("minimum_quantity")?,
            batch_id: row.try_get("batch_id")?,
            unit_cost: row.try_get("unit_cost")?,
            description: row.try_get("description")?,
            strain: row.try_get("strain")?,
            brand: row.try_get("brand")?,
            supplier: row.try_get("supplier")?,
            expiration_date: row.try_get("expiration_date")?,
            location: row.try_get("location")?,
            created_by: row.try_get("created_by")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ItemRow> for InventoryItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(InventoryItem {
            id: InventoryItemId(AggregateId::from_uuid(row.id)),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            item_type: row
                .item_type
                .parse()
                .map_err(|e| StoreError::Invariant(format!("item {}: {e}", row.id)))?,
            unit: row
                .unit
                .parse()
                .map_err(|e| StoreError::Invariant(format!("item {}: {e}", row.id)))?,
            current_quantity: row.current_quantity,
            minimum_quantity: row.minimum_quantity,
            batch_id: row.batch_id.map(BatchId::from_uuid),
            unit_cost: row.unit_cost,
            details: ItemDetails {
                description: row.description,
                strain: row.strain,
                brand: row.brand,
                supplier: row.supplier,
                expiration_date: row.expiration_date,
                location: row.location,
            },
            created_by: UserId::from_uuid(row.created_by),
            version: row.version as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn item_from_row(row: &PgRow) -> Result<InventoryItem, StoreError> {
    ItemRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to deserialize item row: {e}")))?
        .try_into()
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    tenant_id: Uuid,
    item_id: Uuid,
    movement_type: String,
    quantity: f64,
    previous_quantity: f64,
    new_quantity: f64,
    cost: Option<f64>,
    batch_id: Option<Uuid>,
    notes: Option<String>,
    actor: Uuid,
    sequence: i64,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            item_id: row.try_get("item_id")?,
            movement_type: row.try_get("movement_type")?,
            quantity: row.try_get("quantity")?,
            previous_quantity: row.try_get("previous_quantity")?,
            new_quantity: row.try_get("new_quantity")?,
            cost: row.try_get("cost")?,
            batch_id: row.try_get("batch_id")?,
            notes: row.try_get("notes")?,
            actor: row.try_get("actor")?,
            sequence: row.try_get("sequence")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<MovementRow> for InventoryMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type: MovementType = row
            .movement_type
            .parse()
            .map_err(|e| StoreError::Invariant(format!("movement {}: {e}", row.id)))?;

        Ok(InventoryMovement {
            id: MovementId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            item_id: InventoryItemId(AggregateId::from_uuid(row.item_id)),
            movement_type,
            quantity: row.quantity,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            cost: row.cost,
            batch_id: row.batch_id.map(BatchId::from_uuid),
            notes: row.notes,
            actor: UserId::from_uuid(row.actor),
            sequence: row.sequence as u64,
            occurred_at: row.occurred_at,
        })
    }
}

fn movement_from_row(row: &PgRow) -> Result<InventoryMovement, StoreError> {
    MovementRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to deserialize movement row: {e}")))?
        .try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    use growledger_inventory::UnitOfMeasure;

    fn item_row(item_type: &str, unit: &str) -> ItemRow {
        let now = Utc::now();
        ItemRow {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            name: "Trichome trim".to_string(),
            item_type: item_type.to_string(),
            unit: unit.to_string(),
            current_quantity: 12.5,
            minimum_quantity: Some(20.0),
            batch_id: None,
            unit_cost: None,
            description: None,
            strain: Some("Northern Lights".to_string()),
            brand: None,
            supplier: None,
            expiration_date: NaiveDate::from_ymd_opt(2027, 1, 31),
            location: Some("Dry room".to_string()),
            created_by: Uuid::now_v7(),
            version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn item_row_converts_to_domain() {
        let item = InventoryItem::try_from(item_row("HARVEST_DRY", "GRAM")).unwrap();
        assert_eq!(item.item_type, ItemType::HarvestDry);
        assert_eq!(item.unit, UnitOfMeasure::Gram);
        assert_eq!(item.details.strain.as_deref(), Some("Northern Lights"));
        assert_eq!(item.version, 3);
        assert!(item.is_low_stock());
    }

    #[test]
    fn unknown_enum_text_is_reported_as_corruption() {
        let err = InventoryItem::try_from(item_row("FLOWER", "GRAM")).unwrap_err();
        assert!(matches!(err, StoreError::Invariant(_)));
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        let err = map_sqlx_error("get_item", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Timeout(msg) if msg.contains("get_item")));
    }

    #[test]
    fn failed_rollback_keeps_the_original_outcome() {
        let conflict: Result<(), StoreError> = Err(StoreError::Concurrency("item moved".to_string()));
        let settled = settle_rollback(conflict, Err(sqlx::Error::PoolTimedOut));
        assert_eq!(settled, Err(StoreError::Concurrency("item moved".to_string())));

        let missing: Result<Option<u64>, StoreError> = Ok(None);
        assert_eq!(settle_rollback(missing, Err(sqlx::Error::PoolClosed)), Ok(None));
    }

    #[test]
    fn delete_locks_the_item_row() {
        assert!(LOCK_ITEM_SQL.ends_with("FOR UPDATE"));
        assert!(LOCK_ITEM_SQL.contains("tenant_id = $1"));
    }

    #[test]
    fn migration_declares_cascade() {
        assert!(MIGRATION.contains("ON DELETE CASCADE"));
        assert!(MIGRATION.contains("UNIQUE (item_id, sequence)"));
    }
}
