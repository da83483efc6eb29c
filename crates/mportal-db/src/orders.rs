//! Database operations for `sales_orders` and `order_items`.

use chrono::{DateTime, Utc};
use mportal_core::{normalize_sku, ChannelOrderItem, ChannelOrderRecord, OrderStatus, Pagination};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Connection, PgConnection, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sales_orders` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderRow {
    pub id: i64,
    pub channel_id: i64,
    pub external_order_id: String,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: String,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub currency_code: String,
    pub ordered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_items` table.
///
/// `product_id` is `NULL` when the line's SKU matched no canonical product.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub sku: Option<String>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

/// An order entered by hand rather than pulled from a channel.
///
/// Subtotal and total are derived from the items.
#[derive(Debug, Clone)]
pub struct ManualOrder {
    /// Generated as `manual-<uuid>` when absent.
    pub external_order_id: Option<String>,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: OrderStatus,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub currency_code: String,
    pub ordered_at: Option<DateTime<Utc>>,
    pub items: Vec<ChannelOrderItem>,
}

impl ManualOrder {
    fn into_record(self) -> ChannelOrderRecord {
        let subtotal: Decimal = self.items.iter().map(ChannelOrderItem::line_total).sum();
        ChannelOrderRecord {
            external_order_id: self
                .external_order_id
                .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4())),
            order_number: self.order_number,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            status: self.status,
            subtotal,
            tax_amount: self.tax_amount,
            shipping_amount: self.shipping_amount,
            total_amount: subtotal + self.tax_amount + self.shipping_amount,
            currency_code: self.currency_code,
            ordered_at: self.ordered_at.unwrap_or_else(Utc::now),
            items: self.items,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilters<'a> {
    pub channel_id: Option<i64>,
    pub status: Option<&'a str>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct UpsertedOrder {
    id: i64,
    inserted: bool,
}

const ORDER_COLUMNS: &str = "id, channel_id, external_order_id, order_number, customer_name, \
                             customer_email, status, subtotal, tax_amount, shipping_amount, \
                             total_amount, currency_code, ordered_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, sku, title, quantity, unit_price, total_price";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts or refreshes an order keyed on `(channel_id, external_order_id)`.
///
/// Status, amounts and `ordered_at` are updated in place on conflict. Items
/// are written only when the order is first inserted. Returns the order id
/// and whether it was inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the order and its items
/// are rolled back together.
pub async fn upsert_order(
    conn: &mut PgConnection,
    channel_id: i64,
    order: &ChannelOrderRecord,
) -> Result<(i64, bool), DbError> {
    let mut tx = conn.begin().await?;

    let upserted = sqlx::query_as::<_, UpsertedOrder>(
        "INSERT INTO sales_orders \
             (channel_id, external_order_id, order_number, customer_name, customer_email, \
              status, subtotal, tax_amount, shipping_amount, total_amount, currency_code, \
              ordered_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (channel_id, external_order_id) DO UPDATE SET \
             status          = EXCLUDED.status, \
             subtotal        = EXCLUDED.subtotal, \
             tax_amount      = EXCLUDED.tax_amount, \
             shipping_amount = EXCLUDED.shipping_amount, \
             total_amount    = EXCLUDED.total_amount, \
             ordered_at      = EXCLUDED.ordered_at, \
             updated_at      = NOW() \
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(channel_id)
    .bind(&order.external_order_id)
    .bind(&order.order_number)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(order.status.as_str())
    .bind(order.subtotal)
    .bind(order.tax_amount)
    .bind(order.shipping_amount)
    .bind(order.total_amount)
    .bind(&order.currency_code)
    .bind(order.ordered_at)
    .fetch_one(&mut *tx)
    .await?;

    if upserted.inserted {
        for item in &order.items {
            insert_order_item(&mut *tx, upserted.id, item).await?;
        }
    }

    tx.commit().await?;
    Ok((upserted.id, upserted.inserted))
}

/// Inserts one order line, resolving `product_id` by normalized SKU.
///
/// The SKU is stored normalized when it is valid and verbatim otherwise.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a non-positive quantity.
pub async fn insert_order_item(
    conn: &mut PgConnection,
    order_id: i64,
    item: &ChannelOrderItem,
) -> Result<OrderItemRow, DbError> {
    let raw_sku = item.sku.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let normalized = raw_sku.and_then(|s| normalize_sku(s).ok());
    let stored_sku = normalized.clone().or_else(|| raw_sku.map(str::to_owned));

    let sql = format!(
        "INSERT INTO order_items \
             (order_id, product_id, sku, title, quantity, unit_price, total_price) \
         VALUES ($1, (SELECT id FROM products WHERE sku = $2), $3, $4, $5, $6, $7) \
         RETURNING {ITEM_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(order_id)
        .bind(normalized)
        .bind(stored_sku)
        .bind(&item.title)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total())
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

/// Records a hand-entered order on `channel_id`.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when the external order id already exists
/// on the channel, or [`DbError::Sqlx`].
pub async fn create_manual_order(
    pool: &PgPool,
    channel_id: i64,
    order: ManualOrder,
) -> Result<OrderDetail, DbError> {
    let record = order.into_record();
    let mut conn = pool.acquire().await?;
    let (order_id, created) = upsert_order(&mut *conn, channel_id, &record)
        .await
        .map_err(|e| match e {
            DbError::Sqlx(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23503") =>
            {
                DbError::NotFound
            }
            other => other,
        })?;
    drop(conn);

    if !created {
        return Err(DbError::Conflict(format!(
            "order '{}' already exists on channel {channel_id}",
            record.external_order_id
        )));
    }
    get_order(pool, order_id).await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has the given `id`.
pub async fn update_order_status(
    pool: &PgPool,
    id: i64,
    status: OrderStatus,
) -> Result<OrderRow, DbError> {
    let sql = format!(
        "UPDATE sales_orders SET status = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// An order with its items.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has the given `id`.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<OrderDetail, DbError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM sales_orders WHERE id = $1");
    let order = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
    let items = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(id)
        .fetch_all(pool)
        .await?;

    Ok(OrderDetail { order, items })
}

/// One page of orders, newest first, plus the total matching count.
///
/// `from` is inclusive and `to` exclusive.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_orders(
    pool: &PgPool,
    filters: &OrderFilters<'_>,
    pagination: Pagination,
) -> Result<(Vec<OrderRow>, i64), DbError> {
    const WHERE: &str = "WHERE ($1::BIGINT IS NULL OR channel_id = $1) \
                           AND ($2::TEXT IS NULL OR status = $2) \
                           AND ($3::timestamptz IS NULL OR ordered_at >= $3) \
                           AND ($4::timestamptz IS NULL OR ordered_at < $4)";

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM sales_orders {WHERE}"))
        .bind(filters.channel_id)
        .bind(filters.status)
        .bind(filters.from)
        .bind(filters.to)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM sales_orders {WHERE} \
         ORDER BY ordered_at DESC, id DESC \
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(filters.channel_id)
        .bind(filters.status)
        .bind(filters.from)
        .bind(filters.to)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}
