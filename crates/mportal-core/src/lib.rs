pub mod app_config;
pub mod channels;
pub mod config;
pub mod domain;
pub mod inventory;
pub mod pagination;
pub mod password;
pub mod records;
pub mod validate;

use thiserror::Error;

pub use app_config::{AppConfig, BestBuySettings, Environment, ShopifySettings};
pub use channels::{load_channels, ChannelConfig, ChannelsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{ChannelKind, MovementType, OrderStatus, ProductStatus, Role};
pub use inventory::{InventoryError, InventoryLevel};
pub use pagination::{PageMeta, Pagination};
pub use password::{hash_password, verify_password};
pub use records::{ChannelOrderItem, ChannelOrderRecord, ChannelProductRecord};
pub use validate::{normalize_email, normalize_sku, parse_money, validate_password};

/// Validation failures for domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid sku '{value}': {reason}")]
    InvalidSku { value: String, reason: &'static str },

    #[error("invalid email '{0}'")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Failures while loading configuration from the environment or the channel seed file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read channels file {path}: {source}")]
    ChannelsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse channels file: {0}")]
    ChannelsFileParse(#[from] serde_yaml::Error),

    #[error("invalid channels file: {0}")]
    Validation(String),
}
