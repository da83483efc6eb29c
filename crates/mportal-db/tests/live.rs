//! Live integration tests for mportal-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/mportal-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{NaiveDate, TimeZone, Utc};
use mportal_core::{
    ChannelConfig, ChannelKind, ChannelOrderItem, ChannelOrderRecord, InventoryError,
    MovementType, OrderStatus, Pagination,
};
use mportal_db::{
    adjust_inventory, archive_product, complete_sync_log, create_channel, create_product,
    create_sync_log, create_user, fail_sync_log, find_or_create_product_by_sku,
    get_channel_by_code, get_order, get_product, list_activity, list_channel_products_for_product,
    list_daily_summary, list_low_stock, list_movements, list_products, list_sync_logs, list_users,
    record_activity, refresh_daily_summary, register_user, relink_channel_product,
    release_inventory, reserve_inventory, sales_overview, seed_channels, set_inventory_quantity,
    top_products, update_product, upsert_channel_product, upsert_order, ChannelProductUpsert,
    DbError, InventoryAdjustment, NewActivity, NewChannel, NewProduct, NewUser, ProductFilters,
    ProductUpdate, SetQuantity, SyncCounts,
};
use rust_decimal::Decimal;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_test_channel(pool: &sqlx::PgPool, code: &str) -> i64 {
    create_channel(
        pool,
        &NewChannel {
            name: &format!("Test {code}"),
            code,
            kind: "manual",
            base_url: None,
            currency_code: "USD",
            is_active: true,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_channel failed for '{code}': {e}"))
    .id
}

fn new_product(sku: &str) -> NewProduct<'_> {
    NewProduct {
        sku,
        name: "Blue Widget",
        description: None,
        brand: Some("Acme"),
        category: Some("widgets"),
        price: Decimal::new(1299, 2),
        cost: None,
        currency_code: "USD",
        status: "active",
        image_url: None,
    }
}

async fn insert_test_product(pool: &sqlx::PgPool, sku: &str) -> i64 {
    create_product(pool, &new_product(sku))
        .await
        .unwrap_or_else(|e| panic!("create_product failed for '{sku}': {e}"))
        .id
}

fn order_record(external_id: &str, status: OrderStatus, day: u32) -> ChannelOrderRecord {
    ChannelOrderRecord {
        external_order_id: external_id.to_string(),
        order_number: Some(format!("#{external_id}")),
        customer_name: Some("Jane Buyer".to_string()),
        customer_email: Some("jane@example.com".to_string()),
        status,
        subtotal: Decimal::new(2000, 2),
        tax_amount: Decimal::ZERO,
        shipping_amount: Decimal::ZERO,
        total_amount: Decimal::new(2000, 2),
        currency_code: "USD".to_string(),
        ordered_at: Utc
            .with_ymd_and_hms(2025, 3, day, 15, 0, 0)
            .single()
            .expect("valid timestamp"),
        items: vec![ChannelOrderItem {
            sku: Some(" wid-1 ".to_string()),
            title: "Blue Widget".to_string(),
            quantity: 2,
            unit_price: Decimal::new(1000, 2),
        }],
    }
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
}

// ---------------------------------------------------------------------------
// Section 1: Users and channels
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_user_rejects_duplicate_email(pool: sqlx::PgPool) {
    let user = NewUser {
        email: "admin@example.com",
        password_hash: "hash",
        first_name: None,
        last_name: None,
        role: "admin",
    };
    create_user(&pool, &user).await.expect("first insert");

    let err = create_user(&pool, &user).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err:?}");

    let users = list_users(&pool).await.expect("list");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].role, "admin");
    assert!(users[0].is_active);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_first_registrations_yield_one_admin(pool: sqlx::PgPool) {
    let applicant = |email| NewUser {
        email,
        password_hash: "hash",
        first_name: None,
        last_name: None,
        role: "staff",
    };
    let (a, b, c) = (
        applicant("a@example.com"),
        applicant("b@example.com"),
        applicant("c@example.com"),
    );
    let (first, second, third) = tokio::join!(
        register_user(&pool, &a),
        register_user(&pool, &b),
        register_user(&pool, &c),
    );
    for result in [first, second, third] {
        result.expect("registration");
    }

    let users = list_users(&pool).await.expect("list");
    assert_eq!(users.len(), 3);
    assert_eq!(users.iter().filter(|u| u.role == "admin").count(), 1);

    let late = register_user(&pool, &applicant("d@example.com")).await.unwrap();
    assert_eq!(late.role, "staff");
    let err = register_user(&pool, &applicant("d@example.com")).await.unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn seed_channels_is_idempotent(pool: sqlx::PgPool) {
    let channels = vec![
        ChannelConfig {
            name: "Shopify".to_string(),
            code: None,
            kind: ChannelKind::Shopify,
            base_url: None,
            currency_code: None,
            is_active: true,
        },
        ChannelConfig {
            name: "Best Buy".to_string(),
            code: Some("bestbuy".to_string()),
            kind: ChannelKind::BestBuy,
            base_url: None,
            currency_code: None,
            is_active: true,
        },
    ];

    assert_eq!(seed_channels(&pool, &channels).await.expect("seed"), 2);
    assert_eq!(seed_channels(&pool, &channels).await.expect("reseed"), 2);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 2);

    let bestbuy = get_channel_by_code(&pool, "bestbuy").await.expect("bestbuy");
    assert_eq!(bestbuy.currency_code, "CAD");
    assert_eq!(bestbuy.kind, "bestbuy");
}

// ---------------------------------------------------------------------------
// Section 2: Products and channel mappings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn find_or_create_product_by_sku_never_overwrites(pool: sqlx::PgPool) {
    let mut conn = pool.acquire().await.expect("acquire");

    let (first, created) = find_or_create_product_by_sku(&mut conn, &new_product("WID-1"))
        .await
        .expect("first call");
    assert!(created);

    let mut other = new_product("WID-1");
    other.name = "Renamed By Channel";
    other.price = Decimal::new(1, 0);
    let (second, created) = find_or_create_product_by_sku(&mut conn, &other)
        .await
        .expect("second call");

    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.name, "Blue Widget");
    assert_eq!(second.price, Decimal::new(1299, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_product_duplicate_sku_is_conflict(pool: sqlx::PgPool) {
    insert_test_product(&pool, "DUP-1").await;
    let err = create_product(&pool, &new_product("DUP-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_product_is_sparse(pool: sqlx::PgPool) {
    let id = insert_test_product(&pool, "SPARSE-1").await;

    let updated = update_product(
        &pool,
        id,
        &ProductUpdate {
            price: Some(Decimal::new(500, 2)),
            ..ProductUpdate::default()
        },
    )
    .await
    .expect("update");

    assert_eq!(updated.price, Decimal::new(500, 2));
    assert_eq!(updated.name, "Blue Widget");
    assert_eq!(updated.brand.as_deref(), Some("Acme"));

    let archived = archive_product(&pool, id).await.expect("archive");
    assert_eq!(archived.status, "archived");
    assert_eq!(get_product(&pool, id).await.expect("get").status, "archived");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_filters_and_counts(pool: sqlx::PgPool) {
    for sku in ["AAA-1", "AAA-2", "BBB-1"] {
        insert_test_product(&pool, sku).await;
    }

    let filters = ProductFilters {
        search: Some("aaa"),
        ..ProductFilters::default()
    };
    let (rows, total) = list_products(&pool, &filters, Pagination::new(Some(1), Some(1)))
        .await
        .expect("list");

    assert_eq!(total, 2);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].sku.starts_with("AAA"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_channel_product_reports_insert_then_update(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "shop").await;
    let product_id = insert_test_product(&pool, "MAP-1").await;
    let mut conn = pool.acquire().await.expect("acquire");

    let upsert = ChannelProductUpsert {
        channel_sku: "map-1",
        external_id: Some("v-100"),
        title: Some("Blue Widget"),
        price: Some(Decimal::new(1299, 2)),
        currency_code: Some("USD"),
        status: "active",
        synced_at: Some(Utc::now()),
    };

    let (row, created) = upsert_channel_product(&mut conn, product_id, channel_id, &upsert)
        .await
        .expect("insert");
    assert!(created);

    let refreshed = ChannelProductUpsert {
        price: Some(Decimal::new(1099, 2)),
        ..upsert
    };
    let (again, created) = upsert_channel_product(&mut conn, product_id, channel_id, &refreshed)
        .await
        .expect("update");
    assert!(!created);
    assert_eq!(again.id, row.id);
    assert_eq!(again.price, Some(Decimal::new(1099, 2)));

    let mappings = list_channel_products_for_product(&pool, product_id)
        .await
        .expect("list");
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].channel_sku, "map-1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn relink_moves_listing_to_renamed_product(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "shop").await;
    let old_id = insert_test_product(&pool, "MAP-OLD").await;
    let new_id = insert_test_product(&pool, "MAP-NEW").await;
    let taken_id = insert_test_product(&pool, "MAP-TAKEN").await;
    let mut conn = pool.acquire().await.expect("acquire");

    let listing = |sku, external_id| ChannelProductUpsert {
        channel_sku: sku,
        external_id: Some(external_id),
        title: Some("Blue Widget"),
        price: Some(Decimal::new(1299, 2)),
        currency_code: Some("USD"),
        status: "active",
        synced_at: Some(Utc::now()),
    };
    let (original, _) =
        upsert_channel_product(&mut conn, old_id, channel_id, &listing("map-old", "v-100"))
            .await
            .expect("map old");
    upsert_channel_product(&mut conn, taken_id, channel_id, &listing("map-taken", "v-200"))
        .await
        .expect("map taken");

    let moved = relink_channel_product(
        &mut conn,
        new_id,
        channel_id,
        "v-100",
        &listing("map-new", "v-100"),
    )
    .await
    .expect("relink")
    .expect("listing moved");
    assert_eq!(moved.id, original.id);
    assert_eq!(moved.product_id, new_id);
    assert_eq!(moved.channel_sku, "map-new");

    let noop = relink_channel_product(
        &mut conn,
        new_id,
        channel_id,
        "v-100",
        &listing("map-new", "v-100"),
    )
    .await
    .expect("relink again");
    assert!(noop.is_none(), "already mapped to this product");
    assert!(list_channel_products_for_product(&pool, old_id)
        .await
        .expect("list")
        .is_empty());

    let err = relink_channel_product(
        &mut conn,
        taken_id,
        channel_id,
        "v-100",
        &listing("map-taken", "v-100"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Section 3: Inventory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn adjust_inventory_records_one_movement(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let product_id = insert_test_product(&pool, "INV-1").await;

    let (row, movement) = adjust_inventory(
        &pool,
        &InventoryAdjustment {
            product_id,
            channel_id,
            change: 12,
            movement_type: MovementType::Restock,
            reason: Some("initial stock"),
            reference: None,
            user_id: None,
        },
    )
    .await
    .expect("restock");

    assert_eq!(row.quantity, 12);
    assert_eq!(row.available_quantity, 12);
    assert_eq!(movement.quantity_before, 0);
    assert_eq!(movement.quantity_after, 12);
    assert_eq!(movement.movement_type, "restock");

    let movements = list_movements(&pool, product_id, None, 10)
        .await
        .expect("movements");
    assert_eq!(movements.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn adjust_inventory_rejects_negative_stock_without_writing(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let product_id = insert_test_product(&pool, "INV-2").await;

    let err = adjust_inventory(
        &pool,
        &InventoryAdjustment {
            product_id,
            channel_id,
            change: -1,
            movement_type: MovementType::Adjustment,
            reason: None,
            reference: None,
            user_id: None,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        DbError::Inventory(InventoryError::NegativeQuantity { .. })
    ));
    let movements = list_movements(&pool, product_id, None, 10)
        .await
        .expect("movements");
    assert!(movements.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn adjust_inventory_unknown_product_is_not_found(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let err = adjust_inventory(
        &pool,
        &InventoryAdjustment {
            product_id: 999_999,
            channel_id,
            change: 1,
            movement_type: MovementType::Adjustment,
            reason: None,
            reference: None,
            user_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn set_inventory_quantity_skips_unchanged_levels(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let product_id = insert_test_product(&pool, "INV-3").await;
    let mut conn = pool.acquire().await.expect("acquire");

    let set = SetQuantity {
        product_id,
        channel_id,
        quantity: 7,
        movement_type: MovementType::Sync,
        reason: None,
        reference: Some("sync:test"),
        user_id: None,
    };

    let (row, movement) = set_inventory_quantity(&mut conn, &set).await.expect("set");
    assert_eq!(row.quantity, 7);
    let movement = movement.expect("first set records a movement");
    assert_eq!(movement.quantity_change, 7);

    let (row, movement) = set_inventory_quantity(&mut conn, &set).await.expect("reset");
    assert_eq!(row.quantity, 7);
    assert!(movement.is_none());

    let movements = list_movements(&pool, product_id, Some(channel_id), 10)
        .await
        .expect("movements");
    assert_eq!(movements.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn lowering_stock_below_reservations_notes_the_drop(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let product_id = insert_test_product(&pool, "INV-5").await;
    let mut conn = pool.acquire().await.expect("acquire");
    let set = |quantity| SetQuantity {
        product_id,
        channel_id,
        quantity,
        movement_type: MovementType::Sync,
        reason: Some("channel stock import"),
        reference: None,
        user_id: None,
    };

    set_inventory_quantity(&mut conn, &set(10)).await.expect("seed stock");
    reserve_inventory(&pool, product_id, channel_id, 6, Some("order:7"), None)
        .await
        .expect("reserve");

    let (row, movement) = set_inventory_quantity(&mut conn, &set(4)).await.expect("lower");
    assert_eq!((row.quantity, row.reserved_quantity), (4, 4));
    let movement = movement.expect("movement");
    assert_eq!(movement.quantity_change, -6);
    assert_eq!(
        movement.reason.as_deref(),
        Some("channel stock import; reserved 6 -> 4")
    );

    let (_, movement) = set_inventory_quantity(&mut conn, &set(9)).await.expect("raise");
    assert_eq!(
        movement.expect("movement").reason.as_deref(),
        Some("channel stock import"),
        "no clamp, no note"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn reserve_and_release_track_available(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "store").await;
    let product_id = insert_test_product(&pool, "INV-4").await;
    let mut conn = pool.acquire().await.expect("acquire");
    set_inventory_quantity(
        &mut conn,
        &SetQuantity {
            product_id,
            channel_id,
            quantity: 5,
            movement_type: MovementType::Restock,
            reason: None,
            reference: None,
            user_id: None,
        },
    )
    .await
    .expect("seed stock");

    let (row, _) = reserve_inventory(&pool, product_id, channel_id, 3, Some("order:1"), None)
        .await
        .expect("reserve");
    assert_eq!(row.reserved_quantity, 3);
    assert_eq!(row.available_quantity, 2);

    let err = reserve_inventory(&pool, product_id, channel_id, 3, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Inventory(InventoryError::InsufficientAvailable { .. })
    ));

    let (row, movement) = release_inventory(&pool, product_id, channel_id, 2, None, None)
        .await
        .expect("release");
    assert_eq!(row.reserved_quantity, 1);
    assert_eq!(movement.quantity_change, -2);
    assert_eq!(movement.movement_type, "release");

    let low = list_low_stock(&pool, None, None).await.expect("low stock");
    assert_eq!(low.len(), 1, "available 4 is below the default reorder point");
    assert_eq!(low[0].sku, "INV-4");
}

// ---------------------------------------------------------------------------
// Section 4: Orders and sales analytics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_order_is_idempotent_and_resolves_items(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "shop").await;
    let product_id = insert_test_product(&pool, "WID-1").await;
    let mut conn = pool.acquire().await.expect("acquire");

    let record = order_record("1001", OrderStatus::Processing, 3);
    let (order_id, created) = upsert_order(&mut conn, channel_id, &record)
        .await
        .expect("insert order");
    assert!(created);

    let shipped = ChannelOrderRecord {
        status: OrderStatus::Shipped,
        ..record
    };
    let (again, created) = upsert_order(&mut conn, channel_id, &shipped)
        .await
        .expect("update order");
    assert!(!created);
    assert_eq!(again, order_id);

    let detail = get_order(&pool, order_id).await.expect("get order");
    assert_eq!(detail.order.status, "shipped");
    assert_eq!(detail.items.len(), 1, "items are not duplicated on update");
    assert_eq!(detail.items[0].product_id, Some(product_id));
    assert_eq!(detail.items[0].sku.as_deref(), Some("WID-1"));
    assert_eq!(detail.items[0].total_price, Decimal::new(2000, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn refresh_daily_summary_excludes_cancelled_orders(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "shop").await;
    insert_test_product(&pool, "WID-1").await;
    let mut conn = pool.acquire().await.expect("acquire");

    for (id, status) in [
        ("A", OrderStatus::Delivered),
        ("B", OrderStatus::Pending),
        ("C", OrderStatus::Cancelled),
    ] {
        upsert_order(&mut conn, channel_id, &order_record(id, status, 4))
            .await
            .expect("insert order");
    }

    let written = refresh_daily_summary(&pool, march(1), march(31))
        .await
        .expect("refresh");
    assert_eq!(written, 1);

    let days = list_daily_summary(&pool, march(1), march(31), None)
        .await
        .expect("daily");
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].summary_date, march(4));
    assert_eq!(days[0].order_count, 2);
    assert_eq!(days[0].units_sold, 4);
    assert_eq!(days[0].gross_revenue, Decimal::new(4000, 2));
    assert_eq!(days[0].average_order_value, Decimal::new(2000, 2));

    let overview = sales_overview(&pool, march(1), march(31), None)
        .await
        .expect("overview");
    assert_eq!(overview.order_count, 2);
    assert_eq!(overview.total_revenue, Decimal::new(4000, 2));

    let top = top_products(&pool, march(1), march(31), 5)
        .await
        .expect("top products");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].units_sold, 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sales_overview_for_empty_range_is_zero(pool: sqlx::PgPool) {
    let overview = sales_overview(&pool, march(1), march(2), None)
        .await
        .expect("overview");
    assert_eq!(overview.order_count, 0);
    assert_eq!(overview.total_revenue, Decimal::ZERO);
    assert_eq!(overview.average_order_value, Decimal::ZERO);
}

// ---------------------------------------------------------------------------
// Section 5: Sync logs and activity
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn sync_log_lifecycle_running_to_partial(pool: sqlx::PgPool) {
    let channel_id = insert_test_channel(&pool, "shop").await;
    let log = create_sync_log(&pool, channel_id, "products", "cli", None)
        .await
        .expect("create");
    assert_eq!(log.status, "running");

    let counts = SyncCounts {
        processed: 3,
        created: 1,
        updated: 1,
        failed: 1,
    };
    let done = complete_sync_log(&pool, log.id, &counts, &json!({"errors": []}))
        .await
        .expect("complete");
    assert_eq!(done.status, "partial");
    assert!(done.completed_at.is_some());

    let err = fail_sync_log(&pool, log.id, "too late", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidSyncLogTransition {
            expected_status: "running",
            ..
        }
    ));

    let logs = list_sync_logs(&pool, Some(channel_id), 10)
        .await
        .expect("list");
    assert_eq!(logs.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn activity_is_listed_newest_first(pool: sqlx::PgPool) {
    for action in ["product.create", "inventory.adjust"] {
        record_activity(
            &pool,
            &NewActivity {
                user_id: None,
                action,
                entity_type: Some("product"),
                entity_id: Some("1".to_string()),
                details: json!({}),
            },
        )
        .await
        .expect("record");
    }

    let rows = list_activity(&pool, 10, None).await.expect("list");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].action, "inventory.adjust");
}
