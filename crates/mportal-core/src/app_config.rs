use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Shopify Admin API credentials. Present only when both the shop URL and
/// the access token are configured.
#[derive(Clone)]
pub struct ShopifySettings {
    pub shop_url: String,
    pub access_token: String,
    pub api_version: String,
}

impl std::fmt::Debug for ShopifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifySettings")
            .field("shop_url", &self.shop_url)
            .field("access_token", &"[redacted]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Best Buy marketplace credentials.
#[derive(Clone)]
pub struct BestBuySettings {
    pub api_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for BestBuySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestBuySettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub channels_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
    pub http_retry_backoff_base_secs: u64,
    pub sync_default_limit: u32,
    pub rate_limit_per_minute: usize,
    pub cors_origins: Vec<String>,
    pub shopify: Option<ShopifySettings>,
    pub bestbuy: Option<BestBuySettings>,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.env, Environment::Development)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("jwt_secret", &"[redacted]")
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("channels_path", &self.channels_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_max_retries", &self.http_max_retries)
            .field(
                "http_retry_backoff_base_secs",
                &self.http_retry_backoff_base_secs,
            )
            .field("sync_default_limit", &self.sync_default_limit)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("cors_origins", &self.cors_origins)
            .field("shopify", &self.shopify)
            .field("bestbuy", &self.bestbuy)
            .finish()
    }
}
