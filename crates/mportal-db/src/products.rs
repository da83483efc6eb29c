//! Database operations for the canonical `products` catalog.

use chrono::{DateTime, Utc};
use mportal_core::Pagination;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::{is_unique_violation, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProductRow {
    pub id: i64,
    /// Always stored in normalized form.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub currency_code: String,
    pub status: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload. `sku` must already be normalized.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub sku: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub brand: Option<&'a str>,
    pub category: Option<&'a str>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub currency_code: &'a str,
    pub status: &'a str,
    pub image_url: Option<&'a str>,
}

/// Sparse update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub brand: Option<&'a str>,
    pub category: Option<&'a str>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub currency_code: Option<&'a str>,
    pub status: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilters<'a> {
    /// Case-insensitive substring match on name or sku.
    pub search: Option<&'a str>,
    pub status: Option<&'a str>,
    pub category: Option<&'a str>,
}

const PRODUCT_COLUMNS: &str = "id, sku, name, description, brand, category, price, cost, \
                               currency_code, status, image_url, created_at, updated_at";

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Returns the product with `new.sku`, inserting it first if absent.
///
/// The boolean is `true` when this call inserted the row. An existing row is
/// returned as-is; none of its columns are overwritten. Concurrent callers
/// with the same SKU converge on a single row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either statement fails.
pub async fn find_or_create_product_by_sku(
    conn: &mut PgConnection,
    new: &NewProduct<'_>,
) -> Result<(ProductRow, bool), DbError> {
    let insert_sql = format!(
        "INSERT INTO products \
             (sku, name, description, brand, category, price, cost, currency_code, status, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (sku) DO NOTHING \
         RETURNING {PRODUCT_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, ProductRow>(&insert_sql)
        .bind(new.sku)
        .bind(new.name)
        .bind(new.description)
        .bind(new.brand)
        .bind(new.category)
        .bind(new.price)
        .bind(new.cost)
        .bind(new.currency_code)
        .bind(new.status)
        .bind(new.image_url)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = inserted {
        return Ok((row, true));
    }

    let select_sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
    let existing = sqlx::query_as::<_, ProductRow>(&select_sql)
        .bind(new.sku)
        .fetch_one(&mut *conn)
        .await?;

    Ok((existing, false))
}

/// # Errors
///
/// Returns [`DbError::Conflict`] when the SKU already exists, or [`DbError::Sqlx`].
pub async fn create_product(pool: &PgPool, new: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    let sql = format!(
        "INSERT INTO products \
             (sku, name, description, brand, category, price, cost, currency_code, status, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(new.sku)
        .bind(new.name)
        .bind(new.description)
        .bind(new.brand)
        .bind(new.category)
        .bind(new.price)
        .bind(new.cost)
        .bind(new.currency_code)
        .bind(new.status)
        .bind(new.image_url)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("sku '{}' already exists", new.sku))
            } else {
                DbError::Sqlx(e)
            }
        })
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has the given `id`.
pub async fn update_product(
    pool: &PgPool,
    id: i64,
    update: &ProductUpdate<'_>,
) -> Result<ProductRow, DbError> {
    let sql = format!(
        "UPDATE products SET \
             name          = COALESCE($2, name), \
             description   = COALESCE($3, description), \
             brand         = COALESCE($4, brand), \
             category      = COALESCE($5, category), \
             price         = COALESCE($6, price), \
             cost          = COALESCE($7, cost), \
             currency_code = COALESCE($8, currency_code), \
             status        = COALESCE($9, status), \
             image_url     = COALESCE($10, image_url), \
             updated_at    = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.brand)
        .bind(update.category)
        .bind(update.price)
        .bind(update.cost)
        .bind(update.currency_code)
        .bind(update.status)
        .bind(update.image_url)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Soft delete: sets `status = 'archived'`. Mappings and inventory are kept.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has the given `id`.
pub async fn archive_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    let sql = format!(
        "UPDATE products SET status = 'archived', updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has the given `id`.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Looks up a product by its normalized SKU.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the SKU is unknown.
pub async fn get_product_by_sku(pool: &PgPool, sku: &str) -> Result<ProductRow, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(sku)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// One page of products plus the total matching count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: &ProductFilters<'_>,
    pagination: Pagination,
) -> Result<(Vec<ProductRow>, i64), DbError> {
    const WHERE: &str = "WHERE ($1::TEXT IS NULL \
                                OR name ILIKE '%' || $1 || '%' \
                                OR sku ILIKE '%' || $1 || '%') \
                           AND ($2::TEXT IS NULL OR status = $2) \
                           AND ($3::TEXT IS NULL OR category = $3)";

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM products {WHERE}"))
        .bind(filters.search)
        .bind(filters.status)
        .bind(filters.category)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products {WHERE} \
         ORDER BY updated_at DESC, id DESC \
         LIMIT $4 OFFSET $5"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(filters.search)
        .bind(filters.status)
        .bind(filters.category)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}
