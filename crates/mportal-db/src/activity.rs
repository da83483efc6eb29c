//! Append-only audit trail in `activity_logs`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ActivityRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub user_id: Option<i64>,
    /// Dotted verb such as `product.create` or `sync.products`.
    pub action: &'a str,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<String>,
    pub details: Value,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_activity(pool: &PgPool, activity: &NewActivity<'_>) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(activity.user_id)
    .bind(activity.action)
    .bind(activity.entity_type)
    .bind(activity.entity_id.as_deref())
    .bind(&activity.details)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Most recent entries first, optionally for one user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_activity(
    pool: &PgPool,
    limit: i64,
    user_id: Option<i64>,
) -> Result<Vec<ActivityRow>, DbError> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT a.id, a.user_id, u.email AS user_email, a.action, a.entity_type, \
                a.entity_id, a.details, a.created_at \
         FROM activity_logs a \
         LEFT JOIN users u ON u.id = a.user_id \
         WHERE ($1::BIGINT IS NULL OR a.user_id = $1) \
         ORDER BY a.created_at DESC, a.id DESC \
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
