//! Database operations for `users`.

use chrono::{DateTime, Utc};
use mportal_core::Role;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use crate::{is_unique_violation, DbError};

/// A row from the `users` table.
///
/// `password_hash` is an argon2 PHC string and is never serialized.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    /// Already normalized with `normalize_email`.
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: &'a str,
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_active, \
                            last_login_at, created_at, updated_at";

/// Advisory lock key serializing self-registration.
const REGISTRATION_LOCK_KEY: i64 = 0x6d70_6f72_7461_6c01;

/// Inserts a user.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when the email is already registered, or
/// [`DbError::Sqlx`] on any other failure.
pub async fn create_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    insert_user(pool, user, user.role).await
}

/// Inserts a self-registered user. The first account ever created is stored
/// as `admin` whatever `user.role` says.
///
/// The emptiness check and the insert share one transaction holding an
/// advisory lock, so concurrent first registrations yield a single admin.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] when the email is already registered, or
/// [`DbError::Sqlx`] on any other failure.
pub async fn register_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(REGISTRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let any_user = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users)")
        .fetch_one(&mut *tx)
        .await?;
    let role = if any_user {
        user.role
    } else {
        Role::Admin.as_str()
    };

    let row = insert_user(&mut *tx, user, role).await?;
    tx.commit().await?;
    Ok(row)
}

async fn insert_user<'e>(
    executor: impl PgExecutor<'e>,
    user: &NewUser<'_>,
    role: &str,
) -> Result<UserRow, DbError> {
    let sql = format!(
        "INSERT INTO users (email, password_hash, first_name, last_name, role) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("email '{}' is already registered", user.email))
            } else {
                DbError::Sqlx(e)
            }
        })
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has the given `id`.
pub async fn get_user_by_id(pool: &PgPool, id: i64) -> Result<UserRow, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All users, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
    let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}
