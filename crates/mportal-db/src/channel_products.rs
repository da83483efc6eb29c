//! Database operations for `channel_products`, the per-channel view of a
//! canonical product.

use chrono::{DateTime, Utc};
use mportal_core::Pagination;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::{is_unique_violation, DbError};

/// A row from the `channel_products` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChannelProductRow {
    pub id: i64,
    pub product_id: i64,
    pub channel_id: i64,
    /// SKU exactly as the channel reports it.
    pub channel_sku: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub currency_code: Option<String>,
    pub status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChannelProductUpsert<'a> {
    pub channel_sku: &'a str,
    pub external_id: Option<&'a str>,
    pub title: Option<&'a str>,
    pub price: Option<Decimal>,
    pub currency_code: Option<&'a str>,
    pub status: &'a str,
    /// `None` for manual mappings that have never been synced.
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct UpsertedRow {
    #[sqlx(flatten)]
    row: ChannelProductRow,
    inserted: bool,
}

const CHANNEL_PRODUCT_COLUMNS: &str = "id, product_id, channel_id, channel_sku, external_id, \
                                       title, price, currency_code, status, last_synced_at, \
                                       created_at, updated_at";

/// Inserts or refreshes the mapping for `(product_id, channel_id)`.
///
/// The boolean is `true` when the row was inserted rather than updated.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when `external_id` already maps a different
/// product on this channel, or [`DbError::Sqlx`].
pub async fn upsert_channel_product(
    conn: &mut PgConnection,
    product_id: i64,
    channel_id: i64,
    upsert: &ChannelProductUpsert<'_>,
) -> Result<(ChannelProductRow, bool), DbError> {
    let sql = format!(
        "INSERT INTO channel_products \
             (product_id, channel_id, channel_sku, external_id, title, price, currency_code, \
              status, last_synced_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (product_id, channel_id) DO UPDATE SET \
             channel_sku    = EXCLUDED.channel_sku, \
             external_id    = COALESCE(EXCLUDED.external_id, channel_products.external_id), \
             title          = COALESCE(EXCLUDED.title, channel_products.title), \
             price          = COALESCE(EXCLUDED.price, channel_products.price), \
             currency_code  = COALESCE(EXCLUDED.currency_code, channel_products.currency_code), \
             status         = EXCLUDED.status, \
             last_synced_at = COALESCE(EXCLUDED.last_synced_at, channel_products.last_synced_at), \
             updated_at     = NOW() \
         RETURNING {CHANNEL_PRODUCT_COLUMNS}, (xmax = 0) AS inserted"
    );
    let upserted = sqlx::query_as::<_, UpsertedRow>(&sql)
        .bind(product_id)
        .bind(channel_id)
        .bind(upsert.channel_sku)
        .bind(upsert.external_id)
        .bind(upsert.title)
        .bind(upsert.price)
        .bind(upsert.currency_code)
        .bind(upsert.status)
        .bind(upsert.synced_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!(
                    "external id '{}' is already mapped to another product on channel {channel_id}",
                    upsert.external_id.unwrap_or_default()
                ))
            } else {
                DbError::Sqlx(e)
            }
        })?;

    Ok((upserted.row, upserted.inserted))
}

/// Moves the listing known by `(channel_id, external_id)` onto `product_id`
/// when it currently maps a different product, refreshing its channel fields.
///
/// This is how a listing follows a SKU renamed on the channel side. Returns
/// `None` when no listing carries the external id or it already maps
/// `product_id`; the caller then upserts as usual.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when `product_id` already has a different
/// listing on this channel, or [`DbError::Sqlx`].
pub async fn relink_channel_product(
    conn: &mut PgConnection,
    product_id: i64,
    channel_id: i64,
    external_id: &str,
    upsert: &ChannelProductUpsert<'_>,
) -> Result<Option<ChannelProductRow>, DbError> {
    let sql = format!(
        "UPDATE channel_products SET \
             product_id     = $1, \
             channel_sku    = $4, \
             title          = COALESCE($5, title), \
             price          = COALESCE($6, price), \
             currency_code  = COALESCE($7, currency_code), \
             status         = $8, \
             last_synced_at = COALESCE($9, last_synced_at), \
             updated_at     = NOW() \
         WHERE channel_id = $2 AND external_id = $3 AND product_id <> $1 \
         RETURNING {CHANNEL_PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, ChannelProductRow>(&sql)
        .bind(product_id)
        .bind(channel_id)
        .bind(external_id)
        .bind(upsert.channel_sku)
        .bind(upsert.title)
        .bind(upsert.price)
        .bind(upsert.currency_code)
        .bind(upsert.status)
        .bind(upsert.synced_at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!(
                    "product {product_id} already has a different listing on channel \
                     {channel_id}; external id '{external_id}' cannot be relinked"
                ))
            } else {
                DbError::Sqlx(e)
            }
        })
}

/// Every channel mapping for one product, ordered by channel.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_channel_products_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<ChannelProductRow>, DbError> {
    let sql = format!(
        "SELECT {CHANNEL_PRODUCT_COLUMNS} FROM channel_products \
         WHERE product_id = $1 \
         ORDER BY channel_id"
    );
    let rows = sqlx::query_as::<_, ChannelProductRow>(&sql)
        .bind(product_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// One page of mappings for a channel plus the total count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_channel_products(
    pool: &PgPool,
    channel_id: i64,
    pagination: Pagination,
) -> Result<(Vec<ChannelProductRow>, i64), DbError> {
    let total =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM channel_products WHERE channel_id = $1")
            .bind(channel_id)
            .fetch_one(pool)
            .await?;

    let sql = format!(
        "SELECT {CHANNEL_PRODUCT_COLUMNS} FROM channel_products \
         WHERE channel_id = $1 \
         ORDER BY channel_sku, id \
         LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, ChannelProductRow>(&sql)
        .bind(channel_id)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no mapping exists for the pair.
pub async fn delete_channel_product(
    pool: &PgPool,
    product_id: i64,
    channel_id: i64,
) -> Result<(), DbError> {
    let result =
        sqlx::query("DELETE FROM channel_products WHERE product_id = $1 AND channel_id = $2")
            .bind(product_id)
            .bind(channel_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
