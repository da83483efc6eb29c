//! Serde types for the Shopify Admin REST API payloads we read.
//!
//! Unknown fields are ignored. Money fields arrive as decimal strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ShopResponse {
    pub shop: ShopInfo,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub myshopify_domain: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<ShopifyProduct>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    /// `active`, `draft` or `archived`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image: Option<ShopifyImage>,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyImage {
    pub src: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyVariant {
    pub id: i64,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub price: String,
    #[serde(default)]
    pub inventory_quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<ShopifyOrder>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyOrder {
    pub id: i64,
    /// Display name such as `#1001`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub currency: String,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    pub subtotal_price: String,
    #[serde(default)]
    pub total_tax: Option<String>,
    pub total_price: String,
    #[serde(default)]
    pub customer: Option<ShopifyCustomer>,
    #[serde(default)]
    pub line_items: Vec<ShopifyLineItem>,
    #[serde(default)]
    pub shipping_lines: Vec<ShopifyShippingLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyCustomer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyLineItem {
    #[serde(default)]
    pub sku: Option<String>,
    pub title: String,
    pub quantity: i32,
    pub price: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopifyShippingLine {
    pub price: String,
}
