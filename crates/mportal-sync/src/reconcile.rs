//! Per-record reconciliation. Each call runs in its own transaction so a
//! failing record never rolls back its neighbours.

use chrono::Utc;
use mportal_core::{ChannelOrderRecord, ChannelProductRecord, MovementType, ProductStatus};
use mportal_db::{
    find_or_create_product_by_sku, relink_channel_product, set_inventory_quantity,
    upsert_channel_product, upsert_order, ChannelProductUpsert, DbError, NewProduct, SetQuantity,
};
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProductOutcome {
    pub product_created: bool,
    pub mapping_created: bool,
    /// `true` when stock changed and a movement was written.
    pub stock_moved: bool,
}

impl ProductOutcome {
    pub fn is_new(self) -> bool {
        self.product_created || self.mapping_created
    }
}

pub(crate) struct ProductContext<'a> {
    pub channel_id: i64,
    /// `sync:<public_id>`, stamped on inventory movements.
    pub reference: &'a str,
    pub user_id: Option<i64>,
}

/// Find-or-create the canonical product by `sku`, refresh its channel
/// mapping and import the channel's stock level.
pub(crate) async fn reconcile_product(
    pool: &PgPool,
    ctx: &ProductContext<'_>,
    sku: &str,
    record: &ChannelProductRecord,
) -> Result<ProductOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let (product, product_created) = find_or_create_product_by_sku(
        &mut *tx,
        &NewProduct {
            sku,
            name: &record.title,
            description: record.description.as_deref(),
            brand: record.brand.as_deref(),
            category: record.category.as_deref(),
            price: record.price,
            cost: None,
            currency_code: &record.currency_code,
            status: ProductStatus::Active.as_str(),
            image_url: record.image_url.as_deref(),
        },
    )
    .await?;

    let listing = ChannelProductUpsert {
        channel_sku: &record.sku,
        external_id: Some(&record.external_id),
        title: Some(&record.title),
        price: Some(record.price),
        currency_code: Some(&record.currency_code),
        status: record.status.as_str(),
        synced_at: Some(Utc::now()),
    };
    // A listing whose SKU was renamed on the channel keeps its external id.
    let relinked = relink_channel_product(
        &mut *tx,
        product.id,
        ctx.channel_id,
        &record.external_id,
        &listing,
    )
    .await?;
    let mapping_created = match relinked {
        Some(row) => {
            tracing::info!(
                sku,
                external_id = %record.external_id,
                product_id = row.product_id,
                "listing relinked to renamed sku"
            );
            false
        }
        None => {
            upsert_channel_product(&mut *tx, product.id, ctx.channel_id, &listing)
                .await?
                .1
        }
    };

    let mut stock_moved = false;
    if let Some(reported) = record.quantity {
        if reported < 0 {
            tracing::warn!(sku, reported, "channel reports negative stock, importing as zero");
        }
        let (_, movement) = set_inventory_quantity(
            &mut *tx,
            &SetQuantity {
                product_id: product.id,
                channel_id: ctx.channel_id,
                quantity: reported.max(0),
                movement_type: MovementType::Sync,
                reason: Some("channel stock import"),
                reference: Some(ctx.reference),
                user_id: ctx.user_id,
            },
        )
        .await?;
        stock_moved = movement.is_some();
    }

    tx.commit().await?;

    tracing::debug!(
        sku,
        product_id = product.id,
        product_created,
        mapping_created,
        stock_moved,
        "reconciled product"
    );
    Ok(ProductOutcome {
        product_created,
        mapping_created,
        stock_moved,
    })
}

/// Upserts one order. Returns `true` when the order was new.
pub(crate) async fn reconcile_order(
    pool: &PgPool,
    channel_id: i64,
    record: &ChannelOrderRecord,
) -> Result<bool, DbError> {
    let mut conn = pool.acquire().await?;
    let (order_id, inserted) = upsert_order(&mut *conn, channel_id, record).await?;
    tracing::debug!(
        external_order_id = %record.external_order_id,
        order_id,
        inserted,
        "reconciled order"
    );
    Ok(inserted)
}
