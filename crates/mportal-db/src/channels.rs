//! Database operations for `channels`.

use chrono::{DateTime, Utc};
use mportal_core::ChannelConfig;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::{is_unique_violation, DbError};

/// A row from the `channels` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub kind: String,
    pub base_url: Option<String>,
    pub currency_code: String,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChannel<'a> {
    pub name: &'a str,
    pub code: &'a str,
    pub kind: &'a str,
    pub base_url: Option<&'a str>,
    pub currency_code: &'a str,
    pub is_active: bool,
}

/// Sparse update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ChannelUpdate<'a> {
    pub name: Option<&'a str>,
    pub base_url: Option<&'a str>,
    pub currency_code: Option<&'a str>,
    pub is_active: Option<bool>,
    pub settings: Option<&'a Value>,
}

const CHANNEL_COLUMNS: &str = "id, name, code, kind, base_url, currency_code, is_active, \
                               last_sync_at, settings, created_at, updated_at";

/// # Errors
///
/// Returns [`DbError::Conflict`] when the code is taken, or [`DbError::Sqlx`].
pub async fn create_channel(pool: &PgPool, channel: &NewChannel<'_>) -> Result<ChannelRow, DbError> {
    let sql = format!(
        "INSERT INTO channels (name, code, kind, base_url, currency_code, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {CHANNEL_COLUMNS}"
    );
    sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(channel.name)
        .bind(channel.code)
        .bind(channel.kind)
        .bind(channel.base_url)
        .bind(channel.currency_code)
        .bind(channel.is_active)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("channel code '{}' already exists", channel.code))
            } else {
                DbError::Sqlx(e)
            }
        })
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no channel has the given `id`.
pub async fn update_channel(
    pool: &PgPool,
    id: i64,
    update: &ChannelUpdate<'_>,
) -> Result<ChannelRow, DbError> {
    let sql = format!(
        "UPDATE channels SET \
             name          = COALESCE($2, name), \
             base_url      = COALESCE($3, base_url), \
             currency_code = COALESCE($4, currency_code), \
             is_active     = COALESCE($5, is_active), \
             settings      = COALESCE($6, settings), \
             updated_at    = NOW() \
         WHERE id = $1 \
         RETURNING {CHANNEL_COLUMNS}"
    );
    sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(id)
        .bind(update.name)
        .bind(update.base_url)
        .bind(update.currency_code)
        .bind(update.is_active)
        .bind(update.settings)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no channel has the given `id`.
pub async fn get_channel_by_id(pool: &PgPool, id: i64) -> Result<ChannelRow, DbError> {
    let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1");
    sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no channel has the given code.
pub async fn get_channel_by_code(pool: &PgPool, code: &str) -> Result<ChannelRow, DbError> {
    let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE code = $1");
    sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_channels(pool: &PgPool, active_only: bool) -> Result<Vec<ChannelRow>, DbError> {
    let sql = format!(
        "SELECT {CHANNEL_COLUMNS} FROM channels \
         WHERE ($1 = FALSE OR is_active = TRUE) \
         ORDER BY name"
    );
    let rows = sqlx::query_as::<_, ChannelRow>(&sql)
        .bind(active_only)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Stamps `last_sync_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_channel_synced(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE channels SET last_sync_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Upsert channels from the seed file, keyed on `code`.
///
/// All upserts run inside a single transaction; if any fails the batch is
/// rolled back. Returns the number of channels processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_channels(pool: &PgPool, channels: &[ChannelConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for channel in channels {
        sqlx::query(
            "INSERT INTO channels (name, code, kind, base_url, currency_code, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (code) DO UPDATE SET \
                 name          = EXCLUDED.name, \
                 kind          = EXCLUDED.kind, \
                 base_url      = EXCLUDED.base_url, \
                 currency_code = EXCLUDED.currency_code, \
                 is_active     = EXCLUDED.is_active, \
                 updated_at    = NOW()",
        )
        .bind(channel.name.trim())
        .bind(channel.code())
        .bind(channel.kind.as_str())
        .bind(channel.base_url.as_deref())
        .bind(channel.currency())
        .bind(channel.is_active)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
