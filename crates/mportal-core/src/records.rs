//! Channel-neutral records produced by the channel clients and consumed by
//! the sync engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderStatus, ProductStatus};

/// One listing as a channel reports it.
///
/// For Shopify this is a single variant (the SKU lives on the variant); for
/// Best Buy it is a marketplace offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelProductRecord {
    /// Channel-side identifier (Shopify variant id, Mirakl offer id).
    pub external_id: String,
    /// SKU exactly as the channel reports it. Normalized by the sync engine.
    pub sku: String,
    pub title: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    /// ISO 4217 code. Never converted.
    pub currency_code: String,
    pub status: ProductStatus,
    /// On-hand quantity when the channel exposes it.
    pub quantity: Option<i32>,
    pub image_url: Option<String>,
}

/// One order line as a channel reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOrderItem {
    pub sku: Option<String>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl ChannelOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One order as a channel reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOrderRecord {
    pub external_order_id: String,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub currency_code: String,
    pub ordered_at: DateTime<Utc>,
    pub items: Vec<ChannelOrderItem>,
}

impl ChannelOrderRecord {
    #[must_use]
    pub fn units(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(qty: i32, price: &str) -> ChannelOrderItem {
        ChannelOrderItem {
            sku: Some("SKU-1".to_string()),
            title: "Widget".to_string(),
            quantity: qty,
            unit_price: Decimal::from_str(price).unwrap(),
        }
    }

    #[test]
    fn line_total_multiplies_quantity() {
        assert_eq!(item(3, "2.50").line_total(), Decimal::from_str("7.50").unwrap());
    }

    #[test]
    fn units_sums_item_quantities() {
        let order = ChannelOrderRecord {
            external_order_id: "1001".to_string(),
            order_number: Some("#1001".to_string()),
            customer_name: None,
            customer_email: None,
            status: OrderStatus::Pending,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            currency_code: "USD".to_string(),
            ordered_at: Utc::now(),
            items: vec![item(2, "1.00"), item(5, "1.00")],
        };
        assert_eq!(order.units(), 7);
    }

    #[test]
    fn price_serializes_as_string() {
        let record = ChannelProductRecord {
            external_id: "44".to_string(),
            sku: "ABC".to_string(),
            title: "Thing".to_string(),
            description: None,
            brand: None,
            category: None,
            price: Decimal::from_str("19.99").unwrap(),
            currency_code: "CAD".to_string(),
            status: ProductStatus::Active,
            quantity: Some(4),
            image_url: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["price"], "19.99");
        assert_eq!(json["status"], "active");
    }
}
