//! Offline unit tests for mportal-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use mportal_core::{AppConfig, Environment};
use mportal_db::{InventoryRow, OrderDetail, OrderRow, PoolConfig, SyncCounts, UserRow};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_ttl_hours: 24,
        channels_path: PathBuf::from("./config/channels.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        http_timeout_secs: 30,
        http_max_retries: 2,
        http_retry_backoff_base_secs: 1,
        sync_default_limit: 50,
        rate_limit_per_minute: 300,
        cors_origins: vec![],
        shopify: None,
        bestbuy: None,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn inventory_row_level_mirrors_columns() {
    let row = InventoryRow {
        id: 1,
        product_id: 2,
        channel_id: 3,
        quantity: 10,
        reserved_quantity: 4,
        available_quantity: 6,
        reorder_point: 5,
        updated_at: Utc::now(),
    };
    let level = row.level();
    assert_eq!(level.quantity, 10);
    assert_eq!(level.reserved, 4);
    assert_eq!(level.available(), row.available_quantity);
}

#[test]
fn user_row_never_serializes_password_hash() {
    let row = UserRow {
        id: 1,
        email: "admin@example.com".to_string(),
        password_hash: "$argon2id$v=19$secret".to_string(),
        first_name: None,
        last_name: None,
        role: "admin".to_string(),
        is_active: true,
        last_login_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let json = serde_json::to_value(&row).expect("serialize user");
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["email"], "admin@example.com");
}

#[test]
fn order_detail_flattens_order_fields() {
    let detail = OrderDetail {
        order: OrderRow {
            id: 9,
            channel_id: 1,
            external_order_id: "1001".to_string(),
            order_number: Some("#1001".to_string()),
            customer_name: None,
            customer_email: None,
            status: "pending".to_string(),
            subtotal: Decimal::new(1000, 2),
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            total_amount: Decimal::new(1000, 2),
            currency_code: "USD".to_string(),
            ordered_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        items: vec![],
    };
    let json = serde_json::to_value(&detail).expect("serialize order");
    assert_eq!(json["id"], 9);
    assert_eq!(json["total_amount"], "10.00");
    assert!(json["items"].as_array().is_some_and(Vec::is_empty));
}

#[test]
fn sync_counts_default_to_zero() {
    let counts = SyncCounts::default();
    assert_eq!(
        counts,
        SyncCounts {
            processed: 0,
            created: 0,
            updated: 0,
            failed: 0
        }
    );
}
