//! Database operations for `inventory` and `inventory_movements`.
//!
//! Every write locks the `(product_id, channel_id)` row, applies the
//! [`InventoryLevel`] arithmetic, updates the row and records exactly one
//! movement, all inside one transaction. Rows are created on first touch
//! with zero stock.

use chrono::{DateTime, Utc};
use mportal_core::{InventoryLevel, MovementType, Pagination};
use serde::Serialize;
use sqlx::{Connection, PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `inventory` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct InventoryRow {
    pub id: i64,
    pub product_id: i64,
    pub channel_id: i64,
    pub quantity: i32,
    pub reserved_quantity: i32,
    /// Generated column: `quantity - reserved_quantity`.
    pub available_quantity: i32,
    pub reorder_point: i32,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRow {
    #[must_use]
    pub fn level(&self) -> InventoryLevel {
        InventoryLevel::new(self.quantity, self.reserved_quantity)
    }
}

/// Inventory joined with product and channel labels for list views.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct InventoryListRow {
    pub id: i64,
    pub product_id: i64,
    pub sku: String,
    pub product_name: String,
    pub channel_id: i64,
    pub channel_code: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub reorder_point: i32,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `inventory_movements` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MovementRow {
    pub id: i64,
    pub inventory_id: i64,
    pub product_id: i64,
    pub channel_id: i64,
    pub movement_type: String,
    pub quantity_change: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A signed change to on-hand stock.
#[derive(Debug, Clone)]
pub struct InventoryAdjustment<'a> {
    pub product_id: i64,
    pub channel_id: i64,
    pub change: i32,
    pub movement_type: MovementType,
    pub reason: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub user_id: Option<i64>,
}

/// An absolute on-hand level, typically reported by a channel.
#[derive(Debug, Clone)]
pub struct SetQuantity<'a> {
    pub product_id: i64,
    pub channel_id: i64,
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reason: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryFilters<'a> {
    pub product_id: Option<i64>,
    pub channel_id: Option<i64>,
    /// Case-insensitive substring match on product name or sku.
    pub search: Option<&'a str>,
}

const INVENTORY_COLUMNS: &str = "id, product_id, channel_id, quantity, reserved_quantity, \
                                 available_quantity, reorder_point, updated_at";

const MOVEMENT_COLUMNS: &str = "id, inventory_id, product_id, channel_id, movement_type, \
                                quantity_change, quantity_before, quantity_after, reason, \
                                reference, created_by, created_at";

const LIST_SELECT: &str = "SELECT i.id, i.product_id, p.sku, p.name AS product_name, \
                                  i.channel_id, c.code AS channel_code, i.quantity, \
                                  i.reserved_quantity, i.available_quantity, i.reorder_point, \
                                  i.updated_at \
                           FROM inventory i \
                           JOIN products p ON p.id = i.product_id \
                           JOIN channels c ON c.id = i.channel_id";

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Ensures the row exists and locks it for the rest of the transaction.
async fn lock_inventory_row(
    conn: &mut PgConnection,
    product_id: i64,
    channel_id: i64,
) -> Result<InventoryRow, DbError> {
    sqlx::query(
        "INSERT INTO inventory (product_id, channel_id) VALUES ($1, $2) \
         ON CONFLICT (product_id, channel_id) DO NOTHING",
    )
    .bind(product_id)
    .bind(channel_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| match &e {
        // Unknown product or channel.
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            DbError::NotFound
        }
        _ => DbError::Sqlx(e),
    })?;

    let sql = format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory \
         WHERE product_id = $1 AND channel_id = $2 \
         FOR UPDATE"
    );
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(product_id)
        .bind(channel_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

async fn write_level(
    conn: &mut PgConnection,
    id: i64,
    level: InventoryLevel,
) -> Result<InventoryRow, DbError> {
    let sql = format!(
        "UPDATE inventory SET quantity = $2, reserved_quantity = $3, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {INVENTORY_COLUMNS}"
    );
    let row = sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(id)
        .bind(level.quantity)
        .bind(level.reserved)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

struct MovementInsert<'a> {
    inventory: &'a InventoryRow,
    movement_type: MovementType,
    change: i32,
    before: i32,
    after: i32,
    reason: Option<&'a str>,
    reference: Option<&'a str>,
    user_id: Option<i64>,
}

async fn insert_movement(
    conn: &mut PgConnection,
    movement: &MovementInsert<'_>,
) -> Result<MovementRow, DbError> {
    let sql = format!(
        "INSERT INTO inventory_movements \
             (inventory_id, product_id, channel_id, movement_type, quantity_change, \
              quantity_before, quantity_after, reason, reference, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {MOVEMENT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, MovementRow>(&sql)
        .bind(movement.inventory.id)
        .bind(movement.inventory.product_id)
        .bind(movement.inventory.channel_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.change)
        .bind(movement.before)
        .bind(movement.after)
        .bind(movement.reason)
        .bind(movement.reference)
        .bind(movement.user_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Applies a signed delta to on-hand stock and records the movement.
///
/// # Errors
///
/// Returns [`DbError::Inventory`] when the arithmetic is rejected (nothing
/// is written), [`DbError::NotFound`] for an unknown product or channel, or
/// [`DbError::Sqlx`].
pub async fn adjust_inventory(
    pool: &PgPool,
    adjustment: &InventoryAdjustment<'_>,
) -> Result<(InventoryRow, MovementRow), DbError> {
    let mut tx = pool.begin().await?;

    let current = lock_inventory_row(&mut *tx, adjustment.product_id, adjustment.channel_id).await?;
    let next = current.level().apply_change(adjustment.change)?;
    let updated = write_level(&mut *tx, current.id, next).await?;
    let movement = insert_movement(
        &mut *tx,
        &MovementInsert {
            inventory: &updated,
            movement_type: adjustment.movement_type,
            change: adjustment.change,
            before: current.quantity,
            after: updated.quantity,
            reason: adjustment.reason,
            reference: adjustment.reference,
            user_id: adjustment.user_id,
        },
    )
    .await?;

    tx.commit().await?;
    Ok((updated, movement))
}

/// Sets on-hand stock to an absolute value and records the delta.
///
/// Reservations above the new quantity are clamped down to it and the drop
/// is appended to the movement reason as `reserved <before> -> <after>`.
/// When the quantity is unchanged no movement is written and `None` is returned for
/// it. Runs in a savepoint when `conn` is already inside a transaction.
///
/// # Errors
///
/// Returns [`DbError::Inventory`] for a negative quantity,
/// [`DbError::NotFound`] for an unknown product or channel, or [`DbError::Sqlx`].
pub async fn set_inventory_quantity(
    conn: &mut PgConnection,
    set: &SetQuantity<'_>,
) -> Result<(InventoryRow, Option<MovementRow>), DbError> {
    let mut tx = conn.begin().await?;

    let current = lock_inventory_row(&mut *tx, set.product_id, set.channel_id).await?;
    let (next, delta) = current.level().set_quantity(set.quantity)?;

    if delta == 0 {
        tx.commit().await?;
        return Ok((current, None));
    }

    let updated = write_level(&mut *tx, current.id, next).await?;
    let clamped = (updated.reserved_quantity < current.reserved_quantity).then(|| {
        let note = format!(
            "reserved {} -> {}",
            current.reserved_quantity, updated.reserved_quantity
        );
        match set.reason {
            Some(reason) => format!("{reason}; {note}"),
            None => note,
        }
    });
    let movement = insert_movement(
        &mut *tx,
        &MovementInsert {
            inventory: &updated,
            movement_type: set.movement_type,
            change: delta,
            before: current.quantity,
            after: updated.quantity,
            reason: clamped.as_deref().or(set.reason),
            reference: set.reference,
            user_id: set.user_id,
        },
    )
    .await?;

    tx.commit().await?;
    Ok((updated, Some(movement)))
}

/// Moves `amount` units from available into reserved.
///
/// The movement row tracks reserved units: `quantity_change = +amount` and
/// before/after hold `reserved_quantity`.
///
/// # Errors
///
/// Returns [`DbError::Inventory`] when fewer than `amount` units are available.
pub async fn reserve_inventory(
    pool: &PgPool,
    product_id: i64,
    channel_id: i64,
    amount: i32,
    reference: Option<&str>,
    user_id: Option<i64>,
) -> Result<(InventoryRow, MovementRow), DbError> {
    change_reservation(
        pool,
        product_id,
        channel_id,
        amount,
        MovementType::Reserve,
        reference,
        user_id,
    )
    .await
}

/// Returns `amount` reserved units to available.
///
/// # Errors
///
/// Returns [`DbError::Inventory`] when fewer than `amount` units are reserved.
pub async fn release_inventory(
    pool: &PgPool,
    product_id: i64,
    channel_id: i64,
    amount: i32,
    reference: Option<&str>,
    user_id: Option<i64>,
) -> Result<(InventoryRow, MovementRow), DbError> {
    change_reservation(
        pool,
        product_id,
        channel_id,
        amount,
        MovementType::Release,
        reference,
        user_id,
    )
    .await
}

async fn change_reservation(
    pool: &PgPool,
    product_id: i64,
    channel_id: i64,
    amount: i32,
    movement_type: MovementType,
    reference: Option<&str>,
    user_id: Option<i64>,
) -> Result<(InventoryRow, MovementRow), DbError> {
    let mut tx = pool.begin().await?;

    let current = lock_inventory_row(&mut *tx, product_id, channel_id).await?;
    let (next, change) = if movement_type == MovementType::Release {
        (current.level().release(amount)?, -amount)
    } else {
        (current.level().reserve(amount)?, amount)
    };
    let updated = write_level(&mut *tx, current.id, next).await?;
    let movement = insert_movement(
        &mut *tx,
        &MovementInsert {
            inventory: &updated,
            movement_type,
            change,
            before: current.reserved_quantity,
            after: updated.reserved_quantity,
            reason: None,
            reference,
            user_id,
        },
    )
    .await?;

    tx.commit().await?;
    Ok((updated, movement))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::NotFound`] if the product has no inventory row on the channel.
pub async fn get_inventory(
    pool: &PgPool,
    product_id: i64,
    channel_id: i64,
) -> Result<InventoryRow, DbError> {
    let sql = format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory WHERE product_id = $1 AND channel_id = $2"
    );
    sqlx::query_as::<_, InventoryRow>(&sql)
        .bind(product_id)
        .bind(channel_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// One page of inventory rows plus the total matching count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_inventory(
    pool: &PgPool,
    filters: &InventoryFilters<'_>,
    pagination: Pagination,
) -> Result<(Vec<InventoryListRow>, i64), DbError> {
    const WHERE: &str = "WHERE ($1::BIGINT IS NULL OR i.product_id = $1) \
                           AND ($2::BIGINT IS NULL OR i.channel_id = $2) \
                           AND ($3::TEXT IS NULL \
                                OR p.name ILIKE '%' || $3 || '%' \
                                OR p.sku ILIKE '%' || $3 || '%')";

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM inventory i JOIN products p ON p.id = i.product_id {WHERE}"
    ))
    .bind(filters.product_id)
    .bind(filters.channel_id)
    .bind(filters.search)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "{LIST_SELECT} {WHERE} \
         ORDER BY p.sku, c.code \
         LIMIT $4 OFFSET $5"
    );
    let rows = sqlx::query_as::<_, InventoryListRow>(&sql)
        .bind(filters.product_id)
        .bind(filters.channel_id)
        .bind(filters.search)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// Rows whose available stock is at or below `threshold`, or at or below
/// the row's own `reorder_point` when no threshold is given.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_low_stock(
    pool: &PgPool,
    threshold: Option<i32>,
    channel_id: Option<i64>,
) -> Result<Vec<InventoryListRow>, DbError> {
    let sql = format!(
        "{LIST_SELECT} \
         WHERE i.available_quantity <= COALESCE($1, i.reorder_point) \
           AND ($2::BIGINT IS NULL OR i.channel_id = $2) \
           AND p.status <> 'archived' \
         ORDER BY i.available_quantity, p.sku"
    );
    let rows = sqlx::query_as::<_, InventoryListRow>(&sql)
        .bind(threshold)
        .bind(channel_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Movement history for a product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_movements(
    pool: &PgPool,
    product_id: i64,
    channel_id: Option<i64>,
    limit: i64,
) -> Result<Vec<MovementRow>, DbError> {
    let sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
         WHERE product_id = $1 \
           AND ($2::BIGINT IS NULL OR channel_id = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, MovementRow>(&sql)
        .bind(product_id)
        .bind(channel_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
