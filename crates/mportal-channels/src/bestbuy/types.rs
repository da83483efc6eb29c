//! Serde types for the Mirakl marketplace API behind Best Buy Canada.
//!
//! Mirakl sends money as JSON numbers, which `Decimal` accepts directly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklAccount {
    #[serde(default)]
    pub shop_id: Option<i64>,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub shop_state: Option<String>,
    #[serde(default)]
    pub currency_iso_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffersResponse {
    pub offers: Vec<MiraklOffer>,
    #[serde(default)]
    pub total_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklOffer {
    pub offer_id: i64,
    #[serde(default)]
    pub shop_sku: Option<String>,
    #[serde(default)]
    pub product_sku: Option<String>,
    #[serde(default)]
    pub product_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_brand: Option<String>,
    #[serde(default)]
    pub category_label: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub currency_iso_code: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<MiraklOrder>,
    #[serde(default)]
    pub total_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklOrder {
    pub order_id: String,
    #[serde(default)]
    pub commercial_id: Option<String>,
    pub created_date: DateTime<Utc>,
    pub order_state: String,
    #[serde(default)]
    pub currency_iso_code: Option<String>,
    /// Sum of line prices before shipping and tax.
    pub price: Decimal,
    #[serde(default)]
    pub shipping_price: Option<Decimal>,
    pub total_price: Decimal,
    #[serde(default)]
    pub customer: Option<MiraklCustomer>,
    #[serde(default)]
    pub order_lines: Vec<MiraklOrderLine>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklCustomer {
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklOrderLine {
    #[serde(default)]
    pub offer_sku: Option<String>,
    #[serde(default)]
    pub product_title: Option<String>,
    pub quantity: i32,
    pub price_unit: Decimal,
    #[serde(default)]
    pub taxes: Vec<MiraklTax>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiraklTax {
    pub amount: Decimal,
    #[serde(default)]
    pub code: Option<String>,
}
