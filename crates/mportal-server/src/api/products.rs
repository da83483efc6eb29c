//! Canonical catalog handlers and manual channel mappings.

use axum::{extract::State, http::StatusCode, Extension, Json};
use mportal_core::{PageMeta, Pagination, ProductStatus};
use mportal_db::{
    ChannelProductRow, ChannelProductUpsert, DbError, NewActivity, NewProduct, ProductFilters,
    ProductRow, ProductUpdate,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::middleware::{CatalogWriter, RequestId};

use super::{
    log_activity, map_db_error, parse_enum, respond, validate_currency, ApiError, ApiJson,
    ApiPath, ApiQuery, ApiResponse, AppState, Paginated,
};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub currency_code: Option<String>,
    pub status: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub currency_code: Option<String>,
    pub status: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ChannelMappingRequest {
    /// Defaults to the canonical SKU.
    pub channel_sku: Option<String>,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub currency_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductDetail {
    #[serde(flatten)]
    product: ProductRow,
    channels: Vec<ChannelProductRow>,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_name(rid: &str, name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 255 {
        return Err(ApiError::validation(rid, "name must be 1-255 characters"));
    }
    Ok(name.to_owned())
}

fn validate_amount(rid: &str, field: &str, value: Decimal) -> Result<Decimal, ApiError> {
    if value.is_sign_negative() {
        return Err(ApiError::validation(
            rid,
            format!("{field} must not be negative"),
        ));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/products
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ApiResponse<Paginated<ProductRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_enum::<ProductStatus>(rid, status)?;
    }

    let pagination = Pagination::new(query.page, query.limit);
    let (items, total) = mportal_db::list_products(
        &state.pool,
        &ProductFilters {
            search: query.search.as_deref().filter(|s| !s.trim().is_empty()),
            status: query.status.as_deref(),
            category: query.category.as_deref(),
        },
        pagination,
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    Ok(respond(
        &req_id,
        Paginated {
            items,
            pagination: PageMeta::new(pagination, total),
        },
    ))
}

/// POST /api/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    ApiJson(body): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductRow>>), ApiError> {
    let rid = &req_id.0;

    let sku = mportal_core::normalize_sku(&body.sku)
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;
    let name = validate_name(rid, &body.name)?;
    let price = validate_amount(rid, "price", body.price)?;
    let cost = body
        .cost
        .map(|c| validate_amount(rid, "cost", c))
        .transpose()?;
    let currency = validate_currency(rid, body.currency_code.as_deref().unwrap_or("USD"))?;
    let status = body
        .status
        .as_deref()
        .map(|s| parse_enum::<ProductStatus>(rid, s))
        .transpose()?
        .unwrap_or(ProductStatus::Active);

    let product = mportal_db::create_product(
        &state.pool,
        &NewProduct {
            sku: &sku,
            name: &name,
            description: body.description.as_deref(),
            brand: body.brand.as_deref(),
            category: body.category.as_deref(),
            price,
            cost,
            currency_code: &currency,
            status: status.as_str(),
            image_url: body.image_url.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "product.create",
            entity_type: Some("product"),
            entity_id: Some(product.id.to_string()),
            details: json!({ "sku": product.sku }),
        },
    )
    .await;

    Ok((StatusCode::CREATED, respond(&req_id, product)))
}

/// GET /api/products/{id}, with every channel mapping.
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let rid = &req_id.0;
    let product = mportal_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    let channels = mportal_db::list_channel_products_for_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, ProductDetail { product, channels }))
}

/// GET /api/products/sku/{sku}. The path value is normalized first.
pub(super) async fn get_product_by_sku(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(sku): ApiPath<String>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    let sku =
        mportal_core::normalize_sku(&sku).map_err(|e| ApiError::validation(rid, e.to_string()))?;
    let product = mportal_db::get_product_by_sku(&state.pool, &sku)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, product))
}

/// PATCH /api/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;

    let name = body
        .name
        .as_deref()
        .map(|n| validate_name(rid, n))
        .transpose()?;
    let price = body
        .price
        .map(|p| validate_amount(rid, "price", p))
        .transpose()?;
    let cost = body
        .cost
        .map(|c| validate_amount(rid, "cost", c))
        .transpose()?;
    let currency = body
        .currency_code
        .as_deref()
        .map(|c| validate_currency(rid, c))
        .transpose()?;
    let status = body
        .status
        .as_deref()
        .map(|s| parse_enum::<ProductStatus>(rid, s))
        .transpose()?;

    let product = mportal_db::update_product(
        &state.pool,
        id,
        &ProductUpdate {
            name: name.as_deref(),
            description: body.description.as_deref(),
            brand: body.brand.as_deref(),
            category: body.category.as_deref(),
            price,
            cost,
            currency_code: currency.as_deref(),
            status: status.map(ProductStatus::as_str),
            image_url: body.image_url.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "product.update",
            entity_type: Some("product"),
            entity_id: Some(id.to_string()),
            details: json!({ "sku": product.sku }),
        },
    )
    .await;

    Ok(respond(&req_id, product))
}

/// DELETE /api/products/{id}. Products are archived, never removed.
pub(super) async fn archive_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<ProductRow>>, ApiError> {
    let rid = &req_id.0;
    let product = mportal_db::archive_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "product.archive",
            entity_type: Some("product"),
            entity_id: Some(id.to_string()),
            details: json!({ "sku": product.sku }),
        },
    )
    .await;

    Ok(respond(&req_id, product))
}

/// PUT /api/products/{id}/channels/{channel_id}. Creates or replaces the
/// product's listing on one channel.
pub(super) async fn map_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(_user): CatalogWriter,
    ApiPath((product_id, channel_id)): ApiPath<(i64, i64)>,
    ApiJson(body): ApiJson<ChannelMappingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChannelProductRow>>), ApiError> {
    let rid = &req_id.0;

    let product = mportal_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    mportal_db::get_channel_by_id(&state.pool, channel_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    let channel_sku = body
        .channel_sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(product.sku.as_str());
    let price = body
        .price
        .map(|p| validate_amount(rid, "price", p))
        .transpose()?;
    let currency = body
        .currency_code
        .as_deref()
        .map(|c| validate_currency(rid, c))
        .transpose()?;
    let status = body
        .status
        .as_deref()
        .map(|s| parse_enum::<ProductStatus>(rid, s))
        .transpose()?
        .unwrap_or(ProductStatus::Active);

    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(|e| map_db_error(rid, &DbError::from(e)))?;
    let (row, created) = mportal_db::upsert_channel_product(
        &mut *conn,
        product_id,
        channel_id,
        &ChannelProductUpsert {
            channel_sku,
            external_id: body.external_id.as_deref(),
            title: body.title.as_deref(),
            price,
            currency_code: currency.as_deref(),
            status: status.as_str(),
            synced_at: None,
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    let code = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((code, respond(&req_id, row)))
}

/// DELETE /api/products/{id}/channels/{channel_id}
pub(super) async fn unmap_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(_user): CatalogWriter,
    ApiPath((product_id, channel_id)): ApiPath<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    mportal_db::delete_channel_product(&state.pool, product_id, channel_id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(StatusCode::NO_CONTENT)
}
