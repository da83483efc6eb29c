//! Integration tests for `ShopifyClient` and the Shopify side of
//! `ChannelConnector`.
//!
//! Each test stands up a local `wiremock` server; no real network traffic.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mportal_channels::{ChannelConnector, ChannelError, HttpPolicy, ShopifyClient};

const API_VERSION: &str = "2024-01";
const TOKEN: &str = "shpat_test_token_1234";

fn no_retries() -> HttpPolicy {
    HttpPolicy {
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_secs: 0,
    }
}

fn test_client(uri: &str) -> ShopifyClient {
    ShopifyClient::with_base_url(uri, TOKEN, API_VERSION, no_retries())
        .expect("failed to build test ShopifyClient")
}

fn api_path(resource: &str) -> String {
    format!("/admin/api/{API_VERSION}/{resource}")
}

fn products_json() -> serde_json::Value {
    json!({
        "products": [{
            "id": 10,
            "title": "Trail Mug",
            "body_html": "<p>Enamel</p>",
            "vendor": "Acme",
            "product_type": "Kitchen",
            "status": "active",
            "image": { "src": "https://cdn.test/mug.png" },
            "variants": [
                { "id": 101, "title": "Red", "sku": "MUG-RED", "price": "12.00", "inventory_quantity": 7 },
                { "id": 102, "title": "Blue", "sku": "", "price": "12.00", "inventory_quantity": 3 },
                { "id": 103, "title": "Black", "sku": "MUG-BLK", "price": "oops", "inventory_quantity": 1 }
            ]
        }]
    })
}

fn orders_json() -> serde_json::Value {
    json!({
        "orders": [{
            "id": 5001,
            "name": "#1001",
            "email": "ada@example.com",
            "created_at": "2025-03-01T12:00:00-05:00",
            "cancelled_at": null,
            "currency": "USD",
            "financial_status": "paid",
            "fulfillment_status": "fulfilled",
            "subtotal_price": "24.00",
            "total_tax": "1.92",
            "total_price": "30.92",
            "customer": { "first_name": "Ada", "last_name": "Lovelace" },
            "line_items": [
                { "sku": "MUG-RED", "title": "Trail Mug - Red", "quantity": 2, "price": "12.00" }
            ],
            "shipping_lines": [ { "price": "5.00" } ]
        }]
    })
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_products_sends_token_and_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .and(query_param("limit", "25"))
        .and(header("x-shopify-access-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_json()))
        .expect(1)
        .mount(&server)
        .await;

    let products = test_client(&server.uri())
        .fetch_products(25)
        .await
        .expect("fetch_products should succeed");

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].variants.len(), 3);
}

#[tokio::test]
async fn fetch_products_caps_limit_at_250() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .and(query_param("limit", "250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": []})))
        .expect(1)
        .mount(&server)
        .await;

    let products = test_client(&server.uri()).fetch_products(10_000).await.unwrap();
    assert!(products.is_empty());
}

#[tokio::test]
async fn fetch_orders_requests_any_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .and(query_param("status", "any"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_json()))
        .expect(1)
        .mount(&server)
        .await;

    let orders = test_client(&server.uri()).fetch_orders(50).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, 5001);
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_maps_to_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("shop.json")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).shop_info().await.unwrap_err();
    assert!(
        matches!(err, ChannelError::Unauthorized { status: 401, .. }),
        "expected Unauthorized, got: {err:?}"
    );
}

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    match test_client(&server.uri()).fetch_products(10).await.unwrap_err() {
        ChannelError::RateLimited {
            retry_after_secs, ..
        } => assert_eq!(retry_after_secs, Some(30)),
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_json()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ShopifyClient::with_base_url(
        &server.uri(),
        TOKEN,
        API_VERSION,
        HttpPolicy {
            timeout_secs: 5,
            max_retries: 3,
            backoff_base_secs: 0,
        },
    )
    .unwrap();

    let products = client.fetch_products(10).await.expect("should recover");
    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = ShopifyClient::with_base_url(
        &server.uri(),
        TOKEN,
        API_VERSION,
        HttpPolicy {
            timeout_secs: 5,
            max_retries: 3,
            backoff_base_secs: 0,
        },
    )
    .unwrap();

    let err = client.fetch_orders(10).await.unwrap_err();
    assert!(matches!(err, ChannelError::UnexpectedStatus { status: 500, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri()).fetch_products(10).await.unwrap_err();
    assert!(matches!(err, ChannelError::Deserialize { .. }));
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connector_normalizes_variants_and_rejects_bad_prices() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("products.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_json()))
        .mount(&server)
        .await;

    let connector = ChannelConnector::Shopify(test_client(&server.uri()));
    let batch = connector.fetch_product_records(50, "USD").await.unwrap();

    assert_eq!(batch.records.len(), 1, "empty-sku variant is skipped");
    assert_eq!(batch.records[0].sku, "MUG-RED");
    assert_eq!(batch.records[0].quantity, Some(7));
    assert_eq!(batch.records[0].currency_code, "USD");
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].key, "103");
}

#[tokio::test]
async fn connector_normalizes_orders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(orders_json()))
        .mount(&server)
        .await;

    let connector = ChannelConnector::Shopify(test_client(&server.uri()));
    let batch = connector.fetch_order_records(50, "USD").await.unwrap();

    assert!(batch.rejected.is_empty());
    let order = &batch.records[0];
    assert_eq!(order.external_order_id, "5001");
    assert_eq!(order.status.as_str(), "shipped");
    assert_eq!(order.customer_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(order.ordered_at.to_rfc3339(), "2025-03-01T17:00:00+00:00");
}

#[tokio::test]
async fn test_connection_reports_shop_on_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("shop.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "shop": { "id": 1, "name": "Demo Store", "currency": "USD" }
        })))
        .mount(&server)
        .await;

    let report = ChannelConnector::Shopify(test_client(&server.uri()))
        .test_connection()
        .await;

    assert!(report.success);
    assert_eq!(report.platform, "shopify");
    assert!(report.message.contains("Demo Store"));
    assert_eq!(report.masked_key.as_deref(), Some("shpa*************1234"));
    assert!(report.troubleshooting.is_none());
}

#[tokio::test]
async fn test_connection_failure_still_produces_report() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(api_path("shop.json")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let report = ChannelConnector::Shopify(test_client(&server.uri()))
        .test_connection()
        .await;

    assert!(!report.success);
    let hints = report.troubleshooting.expect("failure carries hints");
    assert_eq!(hints["error_kind"], "unauthorized");
    assert!(hints.contains_key("credentials"));
}
