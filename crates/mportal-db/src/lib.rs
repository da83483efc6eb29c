use mportal_core::{AppConfig, InventoryError};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/mportal-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("sync log {id} is not in status '{expected_status}'")]
    InvalidSyncLogTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// True when `err` is a Postgres unique violation (SQLSTATE 23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect using the database settings carried by [`AppConfig`].
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if the URL is blank, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    if config.database_url.trim().is_empty() {
        return Err(DbError::MissingDatabaseUrl);
    }
    connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; count that as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}


pub mod activity;
pub mod channel_products;
pub mod channels;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod sales;
pub mod sync_logs;
pub mod users;

pub use activity::{list_activity, record_activity, ActivityRow, NewActivity};
pub use channel_products::{
    delete_channel_product, list_channel_products, list_channel_products_for_product,
    relink_channel_product, upsert_channel_product, ChannelProductRow, ChannelProductUpsert,
};
pub use channels::{
    create_channel, get_channel_by_code, get_channel_by_id, list_channels, mark_channel_synced,
    seed_channels, update_channel, ChannelRow, ChannelUpdate, NewChannel,
};
pub use inventory::{
    adjust_inventory, get_inventory, list_inventory, list_low_stock, list_movements,
    release_inventory, reserve_inventory, set_inventory_quantity, InventoryAdjustment,
    InventoryFilters, InventoryListRow, InventoryRow, MovementRow, SetQuantity,
};
pub use orders::{
    create_manual_order, get_order, insert_order_item, list_orders, update_order_status,
    upsert_order, ManualOrder, OrderDetail, OrderFilters, OrderItemRow, OrderRow,
};
pub use products::{
    archive_product, create_product, find_or_create_product_by_sku, get_product,
    get_product_by_sku, list_products, update_product, NewProduct, ProductFilters, ProductRow,
    ProductUpdate,
};
pub use sales::{
    channel_performance, list_daily_summary, refresh_daily_summary, sales_overview, top_products,
    ChannelPerformanceRow, DailySummaryRow, SalesOverview, TopProductRow,
};
pub use sync_logs::{
    complete_sync_log, create_sync_log, fail_sync_log, get_sync_log_by_public_id, list_sync_logs,
    SyncCounts, SyncLogRow,
};
pub use users::{
    create_user, get_user_by_email, get_user_by_id, list_users, register_user, touch_last_login,
    NewUser, UserRow,
};
