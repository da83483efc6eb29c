//! Shopify payload → channel-neutral records.

use mportal_core::{
    parse_money, ChannelOrderItem, ChannelOrderRecord, ChannelProductRecord, OrderStatus,
    ProductStatus,
};
use rust_decimal::Decimal;

use super::types::{ShopifyCustomer, ShopifyOrder, ShopifyProduct};
use crate::error::ChannelError;

/// One record per variant with a non-empty SKU.
///
/// Variants without a SKU cannot be reconciled and are skipped with a
/// warning. A variant with an unparseable price yields an `Err` entry so the
/// caller can count it as a failed item.
#[must_use]
pub fn normalize_product(
    product: &ShopifyProduct,
    currency: &str,
) -> Vec<Result<ChannelProductRecord, ChannelError>> {
    let status = product_status(product.status.as_deref());
    let description = non_empty(product.body_html.as_deref());
    let brand = non_empty(product.vendor.as_deref());
    let category = non_empty(product.product_type.as_deref());
    let image_url = product.image.as_ref().map(|i| i.src.clone());

    product
        .variants
        .iter()
        .filter_map(|variant| {
            let Some(sku) = non_empty(variant.sku.as_deref()) else {
                tracing::warn!(
                    product_id = product.id,
                    variant_id = variant.id,
                    "skipping shopify variant without sku"
                );
                return None;
            };
            let external_id = variant.id.to_string();

            let price = match parse_money(&variant.price) {
                Ok(price) => price,
                Err(e) => {
                    return Some(Err(ChannelError::Normalization {
                        external_id,
                        reason: e.to_string(),
                    }))
                }
            };

            Some(Ok(ChannelProductRecord {
                external_id,
                sku,
                title: variant_title(&product.title, variant.title.as_deref()),
                description: description.clone(),
                brand: brand.clone(),
                category: category.clone(),
                price,
                currency_code: currency.to_owned(),
                status,
                quantity: variant.inventory_quantity,
                image_url: image_url.clone(),
            }))
        })
        .collect()
}

/// # Errors
///
/// Returns [`ChannelError::Normalization`] when a money field does not parse.
pub fn normalize_order(order: &ShopifyOrder) -> Result<ChannelOrderRecord, ChannelError> {
    let external_order_id = order.id.to_string();
    let money = |raw: &str| {
        parse_money(raw).map_err(|e| ChannelError::Normalization {
            external_id: external_order_id.clone(),
            reason: e.to_string(),
        })
    };

    let items = order
        .line_items
        .iter()
        .map(|line| {
            Ok(ChannelOrderItem {
                sku: non_empty(line.sku.as_deref()),
                title: line.title.clone(),
                quantity: line.quantity,
                unit_price: money(&line.price)?,
            })
        })
        .collect::<Result<Vec<_>, ChannelError>>()?;

    let shipping_amount = order
        .shipping_lines
        .iter()
        .map(|s| money(&s.price))
        .sum::<Result<Decimal, _>>()?;
    let tax_amount = match order.total_tax.as_deref() {
        Some(raw) => money(raw)?,
        None => Decimal::ZERO,
    };

    Ok(ChannelOrderRecord {
        external_order_id: external_order_id.clone(),
        order_number: order.name.clone(),
        customer_name: order.customer.as_ref().and_then(customer_name),
        customer_email: order
            .email
            .clone()
            .or_else(|| order.customer.as_ref().and_then(|c| c.email.clone())),
        status: order_status(order),
        subtotal: money(&order.subtotal_price)?,
        tax_amount,
        shipping_amount,
        total_amount: money(&order.total_price)?,
        currency_code: order.currency.to_ascii_uppercase(),
        ordered_at: order.created_at,
        items,
    })
}

fn product_status(raw: Option<&str>) -> ProductStatus {
    match raw {
        Some("draft") => ProductStatus::Draft,
        Some("archived") => ProductStatus::Archived,
        _ => ProductStatus::Active,
    }
}

/// Cancellation wins, then refunds, then fulfillment, then payment.
pub(crate) fn order_status(order: &ShopifyOrder) -> OrderStatus {
    if order.cancelled_at.is_some() {
        return OrderStatus::Cancelled;
    }
    match order.financial_status.as_deref() {
        Some("refunded") => return OrderStatus::Refunded,
        Some("voided") => return OrderStatus::Cancelled,
        _ => {}
    }
    match order.fulfillment_status.as_deref() {
        Some("fulfilled") => return OrderStatus::Shipped,
        Some("partial") => return OrderStatus::Processing,
        _ => {}
    }
    match order.financial_status.as_deref() {
        Some("paid" | "partially_paid" | "partially_refunded") => OrderStatus::Processing,
        _ => OrderStatus::Pending,
    }
}

fn variant_title(product_title: &str, variant_title: Option<&str>) -> String {
    match variant_title.map(str::trim) {
        Some(v) if !v.is_empty() && v != "Default Title" => format!("{product_title} - {v}"),
        _ => product_title.to_owned(),
    }
}

fn customer_name(customer: &ShopifyCustomer) -> Option<String> {
    let parts: Vec<&str> = [customer.first_name.as_deref(), customer.last_name.as_deref()]
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

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
