//! Mirakl payload → channel-neutral records.

use mportal_core::{
    ChannelOrderItem, ChannelOrderRecord, ChannelProductRecord, OrderStatus, ProductStatus,
};
use rust_decimal::Decimal;

use super::types::{MiraklCustomer, MiraklOffer, MiraklOrder};
use crate::error::ChannelError;

/// `fallback_currency` is used when the offer carries no currency.
///
/// # Errors
///
/// Returns [`ChannelError::Normalization`] when the offer has neither a shop
/// SKU nor a product SKU, or a negative price.
pub fn normalize_offer(
    offer: &MiraklOffer,
    fallback_currency: &str,
) -> Result<ChannelProductRecord, ChannelError> {
    let external_id = offer.offer_id.to_string();
    let sku = non_empty(offer.shop_sku.as_deref())
        .or_else(|| non_empty(offer.product_sku.as_deref()))
        .ok_or_else(|| ChannelError::Normalization {
            external_id: external_id.clone(),
            reason: "offer has no shop_sku or product_sku".to_string(),
        })?;
    if offer.price.is_sign_negative() && !offer.price.is_zero() {
        return Err(ChannelError::Normalization {
            external_id,
            reason: format!("negative price {}", offer.price),
        });
    }

    let title = non_empty(offer.product_title.as_deref()).unwrap_or_else(|| sku.clone());
    Ok(ChannelProductRecord {
        external_id,
        sku,
        title,
        description: non_empty(offer.description.as_deref()),
        brand: non_empty(offer.product_brand.as_deref()),
        category: non_empty(offer.category_label.as_deref()),
        price: offer.price,
        currency_code: currency(offer.currency_iso_code.as_deref(), fallback_currency),
        status: if offer.active {
            ProductStatus::Active
        } else {
            ProductStatus::Draft
        },
        quantity: offer.quantity,
        image_url: None,
    })
}

/// # Errors
///
/// Returns [`ChannelError::Normalization`] when a line has a non-positive
/// quantity.
pub fn normalize_order(
    order: &MiraklOrder,
    fallback_currency: &str,
) -> Result<ChannelOrderRecord, ChannelError> {
    let mut tax_amount = Decimal::ZERO;
    let mut items = Vec::with_capacity(order.order_lines.len());
    for line in &order.order_lines {
        if line.quantity <= 0 {
            return Err(ChannelError::Normalization {
                external_id: order.order_id.clone(),
                reason: format!("order line quantity {} is not positive", line.quantity),
            });
        }
        tax_amount += line.taxes.iter().map(|t| t.amount).sum::<Decimal>();
        let sku = non_empty(line.offer_sku.as_deref());
        items.push(ChannelOrderItem {
            title: non_empty(line.product_title.as_deref())
                .or_else(|| sku.clone())
                .unwrap_or_else(|| "Untitled item".to_string()),
            sku,
            quantity: line.quantity,
            unit_price: line.price_unit,
        });
    }

    Ok(ChannelOrderRecord {
        external_order_id: order.order_id.clone(),
        order_number: order.commercial_id.clone(),
        customer_name: order.customer.as_ref().and_then(customer_name),
        customer_email: order
            .customer
            .as_ref()
            .and_then(|c| non_empty(c.email.as_deref())),
        status: order_status(&order.order_state),
        subtotal: order.price,
        tax_amount,
        shipping_amount: order.shipping_price.unwrap_or(Decimal::ZERO),
        total_amount: order.total_price,
        currency_code: currency(order.currency_iso_code.as_deref(), fallback_currency),
        ordered_at: order.created_date,
        items,
    })
}

/// Maps a Mirakl `order_state` onto the portal's lifecycle. Unknown states
/// fall back to `pending`.
#[must_use]
pub fn order_status(state: &str) -> OrderStatus {
    match state.trim().to_ascii_uppercase().as_str() {
        "SHIPPING" => OrderStatus::Processing,
        "SHIPPED" | "TO_COLLECT" => OrderStatus::Shipped,
        "RECEIVED" | "CLOSED" => OrderStatus::Delivered,
        "REFUSED" | "CANCELED" | "CANCELLED" => OrderStatus::Cancelled,
        "REFUNDED" => OrderStatus::Refunded,
        "WAITING_ACCEPTANCE" | "WAITING_DEBIT" | "WAITING_DEBIT_PAYMENT" | "STAGING" => {
            OrderStatus::Pending
        }
        other => {
            tracing::warn!(order_state = other, "unknown mirakl order state, treating as pending");
            OrderStatus::Pending
        }
    }
}

fn currency(raw: Option<&str>, fallback: &str) -> String {
    non_empty(raw).map_or_else(|| fallback.to_ascii_uppercase(), |c| c.to_ascii_uppercase())
}

fn customer_name(customer: &MiraklCustomer) -> Option<String> {
    let parts: Vec<&str> = [customer.firstname.as_deref(), customer.lastname.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
