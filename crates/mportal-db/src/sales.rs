//! Sales analytics over `sales_orders`, `order_items` and the precomputed
//! `daily_sales_summary` rollup.
//!
//! All ranges are inclusive calendar dates in UTC. Cancelled and refunded
//! orders never count towards revenue.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

const REVENUE_FILTER: &str = "o.status NOT IN ('cancelled', 'refunded') \
                              AND (o.ordered_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2";

/// Headline totals for a date range.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SalesOverview {
    pub order_count: i64,
    pub units_sold: i64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
}

/// A row from `daily_sales_summary` with the channel code attached.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DailySummaryRow {
    pub summary_date: NaiveDate,
    pub channel_id: i64,
    pub channel_code: String,
    pub order_count: i32,
    pub units_sold: i32,
    pub gross_revenue: Decimal,
    pub average_order_value: Decimal,
    pub currency_code: String,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChannelPerformanceRow {
    pub channel_id: i64,
    pub channel_code: String,
    pub channel_name: String,
    pub currency_code: String,
    pub order_count: i64,
    pub units_sold: i64,
    pub revenue: Decimal,
    pub average_order_value: Decimal,
}

/// Best sellers by revenue. `product_id` is `None` for SKUs with no
/// canonical product.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TopProductRow {
    pub product_id: Option<i64>,
    pub sku: Option<String>,
    pub title: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Recomputes `daily_sales_summary` for every day in `from..=to`.
///
/// Existing rows in the range are replaced, so days whose orders were all
/// cancelled drop out. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the range is then left
/// as it was.
pub async fn refresh_daily_summary(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM daily_sales_summary WHERE summary_date BETWEEN $1 AND $2")
        .bind(from)
        .bind(to)
        .execute(&mut *tx)
        .await?;

    let sql = format!(
        "INSERT INTO daily_sales_summary \
             (summary_date, channel_id, order_count, units_sold, gross_revenue, \
              average_order_value, currency_code, refreshed_at) \
         SELECT (o.ordered_at AT TIME ZONE 'UTC')::date, \
                o.channel_id, \
                COUNT(*)::INTEGER, \
                COALESCE(SUM(u.units), 0)::INTEGER, \
                SUM(o.total_amount), \
                ROUND(SUM(o.total_amount) / COUNT(*), 2), \
                MIN(o.currency_code), \
                NOW() \
         FROM sales_orders o \
         LEFT JOIN (SELECT order_id, SUM(quantity) AS units \
                    FROM order_items GROUP BY order_id) u ON u.order_id = o.id \
         WHERE {REVENUE_FILTER} \
         GROUP BY 1, 2 \
         ON CONFLICT (summary_date, channel_id) DO UPDATE SET \
             order_count         = EXCLUDED.order_count, \
             units_sold          = EXCLUDED.units_sold, \
             gross_revenue       = EXCLUDED.gross_revenue, \
             average_order_value = EXCLUDED.average_order_value, \
             currency_code       = EXCLUDED.currency_code, \
             refreshed_at        = NOW()"
    );
    let written = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(written)
}

/// Totals computed directly from orders, optionally for one channel.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sales_overview(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    channel_id: Option<i64>,
) -> Result<SalesOverview, DbError> {
    let sql = format!(
        "SELECT COUNT(*) AS order_count, \
                COALESCE(SUM(u.units), 0)::BIGINT AS units_sold, \
                COALESCE(SUM(o.total_amount), 0) AS total_revenue, \
                COALESCE(ROUND(SUM(o.total_amount) / NULLIF(COUNT(*), 0), 2), 0) \
                    AS average_order_value \
         FROM sales_orders o \
         LEFT JOIN (SELECT order_id, SUM(quantity) AS units \
                    FROM order_items GROUP BY order_id) u ON u.order_id = o.id \
         WHERE {REVENUE_FILTER} \
           AND ($3::BIGINT IS NULL OR o.channel_id = $3)"
    );
    let overview = sqlx::query_as::<_, SalesOverview>(&sql)
        .bind(from)
        .bind(to)
        .bind(channel_id)
        .fetch_one(pool)
        .await?;
    Ok(overview)
}

/// Precomputed daily rows, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_summary(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    channel_id: Option<i64>,
) -> Result<Vec<DailySummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, DailySummaryRow>(
        "SELECT d.summary_date, d.channel_id, c.code AS channel_code, d.order_count, \
                d.units_sold, d.gross_revenue, d.average_order_value, d.currency_code, \
                d.refreshed_at \
         FROM daily_sales_summary d \
         JOIN channels c ON c.id = d.channel_id \
         WHERE d.summary_date BETWEEN $1 AND $2 \
           AND ($3::BIGINT IS NULL OR d.channel_id = $3) \
         ORDER BY d.summary_date, c.code",
    )
    .bind(from)
    .bind(to)
    .bind(channel_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Per-channel totals, highest revenue first. Channels without sales are
/// omitted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn channel_performance(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ChannelPerformanceRow>, DbError> {
    let sql = format!(
        "SELECT c.id AS channel_id, c.code AS channel_code, c.name AS channel_name, \
                c.currency_code, \
                COUNT(*) AS order_count, \
                COALESCE(SUM(u.units), 0)::BIGINT AS units_sold, \
                SUM(o.total_amount) AS revenue, \
                ROUND(SUM(o.total_amount) / COUNT(*), 2) AS average_order_value \
         FROM sales_orders o \
         JOIN channels c ON c.id = o.channel_id \
         LEFT JOIN (SELECT order_id, SUM(quantity) AS units \
                    FROM order_items GROUP BY order_id) u ON u.order_id = o.id \
         WHERE {REVENUE_FILTER} \
         GROUP BY c.id, c.code, c.name, c.currency_code \
         ORDER BY revenue DESC, c.code"
    );
    let rows = sqlx::query_as::<_, ChannelPerformanceRow>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_products(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    limit: i64,
) -> Result<Vec<TopProductRow>, DbError> {
    let sql = format!(
        "SELECT oi.product_id, \
                COALESCE(p.sku, oi.sku) AS sku, \
                COALESCE(p.name, MAX(oi.title)) AS title, \
                SUM(oi.quantity)::BIGINT AS units_sold, \
                SUM(oi.total_price) AS revenue \
         FROM order_items oi \
         JOIN sales_orders o ON o.id = oi.order_id \
         LEFT JOIN products p ON p.id = oi.product_id \
         WHERE {REVENUE_FILTER} \
         GROUP BY oi.product_id, COALESCE(p.sku, oi.sku), p.name \
         ORDER BY revenue DESC, units_sold DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, TopProductRow>(&sql)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
