use crate::app_config::{AppConfig, BestBuySettings, Environment, ShopifySettings};
use crate::ConfigError;

const MIN_JWT_SECRET_LEN: usize = 32;
const DEFAULT_BESTBUY_API_URL: &str = "https://marketplace.bestbuy.ca/api";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the parsing/validation core, decoupled from the real environment
/// so it can be tested with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("MPORTAL_ENV", "development"))?;

    let jwt_secret = require("MPORTAL_JWT_SECRET")?;
    if env != Environment::Development && jwt_secret.len() < MIN_JWT_SECRET_LEN {
        return Err(invalid(
            "MPORTAL_JWT_SECRET",
            format!("must be at least {MIN_JWT_SECRET_LEN} bytes outside development"),
        ));
    }

    let jwt_ttl_hours = or_default("MPORTAL_JWT_TTL_HOURS", "24")
        .parse::<i64>()
        .map_err(|e| invalid("MPORTAL_JWT_TTL_HOURS", e.to_string()))?;
    if jwt_ttl_hours <= 0 {
        return Err(invalid(
            "MPORTAL_JWT_TTL_HOURS",
            "must be greater than zero".to_string(),
        ));
    }

    let bind_addr = or_default("MPORTAL_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("MPORTAL_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("MPORTAL_LOG_LEVEL", "info");
    let channels_path = PathBuf::from(or_default(
        "MPORTAL_CHANNELS_PATH",
        "./config/channels.yaml",
    ));

    let db_max_connections = parse_u32("MPORTAL_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("MPORTAL_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(invalid(
            "MPORTAL_DB_MIN_CONNECTIONS",
            format!("{db_min_connections} exceeds MPORTAL_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }
    let db_acquire_timeout_secs = parse_u64("MPORTAL_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("MPORTAL_HTTP_TIMEOUT_SECS", "30")?;
    let http_max_retries = parse_u32("MPORTAL_HTTP_MAX_RETRIES", "2")?;
    let http_retry_backoff_base_secs = parse_u64("MPORTAL_HTTP_RETRY_BACKOFF_BASE_SECS", "1")?;

    let sync_default_limit = parse_u32("MPORTAL_SYNC_DEFAULT_LIMIT", "50")?;
    if sync_default_limit == 0 {
        return Err(invalid(
            "MPORTAL_SYNC_DEFAULT_LIMIT",
            "must be greater than zero".to_string(),
        ));
    }

    let rate_limit_per_minute = or_default("MPORTAL_RATE_LIMIT_PER_MINUTE", "300")
        .parse::<usize>()
        .map_err(|e| invalid("MPORTAL_RATE_LIMIT_PER_MINUTE", e.to_string()))?;

    let cors_origins = optional("MPORTAL_CORS_ORIGINS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let shopify = match (optional("SHOPIFY_SHOP_URL"), optional("SHOPIFY_ACCESS_TOKEN")) {
        (Some(shop_url), Some(access_token)) => Some(ShopifySettings {
            shop_url,
            access_token,
            api_version: or_default("SHOPIFY_API_VERSION", "2024-01"),
        }),
        _ => None,
    };

    let bestbuy = optional("BESTBUY_API_KEY").map(|api_key| BestBuySettings {
        api_url: or_default("BESTBUY_API_URL", DEFAULT_BESTBUY_API_URL),
        api_key,
    });

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        jwt_secret,
        jwt_ttl_hours,
        channels_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_max_retries,
        http_retry_backoff_base_secs,
        sync_default_limit,
        rate_limit_per_minute,
        cors_origins,
        shopify,
        bestbuy,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "MPORTAL_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
