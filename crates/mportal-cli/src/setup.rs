//! Database setup commands: migrations, channel seeding and the first admin.

use std::path::Path;

use mportal_core::Role;
use mportal_db::{DbError, NewUser};

pub(crate) async fn run_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = mportal_db::run_migrations(pool).await?;
    println!("migrations applied: {applied}");
    Ok(())
}

/// Upsert every channel in the seed file, keyed by code.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or the upsert fails.
pub(crate) async fn run_seed_channels(pool: &sqlx::PgPool, path: &Path) -> anyhow::Result<()> {
    let file = mportal_core::load_channels(path)?;
    let count = mportal_db::seed_channels(pool, &file.channels).await?;
    tracing::info!(path = %path.display(), count, "channels seeded");
    println!("seeded {count} channel(s) from {}", path.display());
    Ok(())
}

/// Create an active admin account.
///
/// # Errors
///
/// Returns an error if the email or password is invalid, or the email is
/// already registered.
pub(crate) async fn run_create_admin(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> anyhow::Result<()> {
    let email = mportal_core::normalize_email(email)?;
    mportal_core::validate_password(password)?;
    let password_hash = mportal_core::hash_password(password)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;

    let user = match mportal_db::create_user(
        pool,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name,
            last_name,
            role: Role::Admin.as_str(),
        },
    )
    .await
    {
        Ok(user) => user,
        Err(DbError::Conflict(_)) => anyhow::bail!("a user with email '{email}' already exists"),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, "admin created");
    println!("created admin {} (id {})", user.email, user.id);
    Ok(())
}
