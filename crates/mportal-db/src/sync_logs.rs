//! Database operations for `sync_logs`.
//!
//! A log is created `running` and moves exactly once to `succeeded`,
//! `partial` or `failed`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `sync_logs` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SyncLogRow {
    pub id: i64,
    pub public_id: Uuid,
    pub channel_id: i64,
    pub sync_type: String,
    pub trigger_source: String,
    pub status: String,
    pub records_processed: i32,
    pub records_created: i32,
    pub records_updated: i32,
    pub records_failed: i32,
    pub error_message: Option<String>,
    /// Per-item errors as `{"errors": [{"key", "reason"}]}`.
    pub details: Value,
    pub triggered_by: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub processed: i32,
    pub created: i32,
    pub updated: i32,
    pub failed: i32,
}

const SYNC_LOG_COLUMNS: &str = "id, public_id, channel_id, sync_type, trigger_source, status, \
                                records_processed, records_created, records_updated, \
                                records_failed, error_message, details, triggered_by, \
                                started_at, completed_at";

/// Creates a new log in `running` status with a fresh `public_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_log(
    pool: &PgPool,
    channel_id: i64,
    sync_type: &str,
    trigger_source: &str,
    triggered_by: Option<i64>,
) -> Result<SyncLogRow, DbError> {
    let sql = format!(
        "INSERT INTO sync_logs (public_id, channel_id, sync_type, trigger_source, triggered_by) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {SYNC_LOG_COLUMNS}"
    );
    let row = sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(channel_id)
        .bind(sync_type)
        .bind(trigger_source)
        .bind(triggered_by)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Marks a running log `succeeded`, or `partial` when `counts.failed > 0`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncLogTransition`] if the log is not `running`.
pub async fn complete_sync_log(
    pool: &PgPool,
    id: i64,
    counts: &SyncCounts,
    details: &Value,
) -> Result<SyncLogRow, DbError> {
    let status = if counts.failed > 0 {
        "partial"
    } else {
        "succeeded"
    };
    let sql = format!(
        "UPDATE sync_logs SET \
             status = $2, records_processed = $3, records_created = $4, \
             records_updated = $5, records_failed = $6, details = $7, completed_at = NOW() \
         WHERE id = $1 AND status = 'running' \
         RETURNING {SYNC_LOG_COLUMNS}"
    );
    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(id)
        .bind(status)
        .bind(counts.processed)
        .bind(counts.created)
        .bind(counts.updated)
        .bind(counts.failed)
        .bind(details)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::InvalidSyncLogTransition {
            id,
            expected_status: "running",
        })
}

/// Marks a running log `failed` with an error message.
///
/// `counts` and `details` are kept when the run got far enough to produce them.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncLogTransition`] if the log is not `running`.
pub async fn fail_sync_log(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    counts: Option<&SyncCounts>,
    details: Option<&Value>,
) -> Result<SyncLogRow, DbError> {
    let counts = counts.copied().unwrap_or_default();
    let sql = format!(
        "UPDATE sync_logs SET \
             status = 'failed', error_message = $2, records_processed = $3, \
             records_created = $4, records_updated = $5, records_failed = $6, \
             details = COALESCE($7, details), completed_at = NOW() \
         WHERE id = $1 AND status = 'running' \
         RETURNING {SYNC_LOG_COLUMNS}"
    );
    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(id)
        .bind(error_message)
        .bind(counts.processed)
        .bind(counts.created)
        .bind(counts.updated)
        .bind(counts.failed)
        .bind(details)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::InvalidSyncLogTransition {
            id,
            expected_status: "running",
        })
}

/// Most recent logs first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_logs(
    pool: &PgPool,
    channel_id: Option<i64>,
    limit: i64,
) -> Result<Vec<SyncLogRow>, DbError> {
    let sql = format!(
        "SELECT {SYNC_LOG_COLUMNS} FROM sync_logs \
         WHERE ($1::BIGINT IS NULL OR channel_id = $1) \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(channel_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no log has the given public id.
pub async fn get_sync_log_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<SyncLogRow, DbError> {
    let sql = format!("SELECT {SYNC_LOG_COLUMNS} FROM sync_logs WHERE public_id = $1");
    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
