//! Orders and sales analytics.

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use mportal_core::{ChannelOrderItem, OrderStatus, PageMeta, Pagination};
use mportal_db::{
    ChannelPerformanceRow, DailySummaryRow, ManualOrder, NewActivity, OrderDetail, OrderFilters,
    OrderRow, SalesOverview, TopProductRow,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::middleware::{AuthUser, CatalogWriter, RequestId};

use super::{
    log_activity, map_db_error, parse_enum, resolve_date_range, respond, validate_currency,
    ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, AppState, OptionalJson, Paginated,
};

/// Longest range a single rollup refresh may rewrite.
const MAX_REFRESH_DAYS: i64 = 366;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct OrderQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub channel_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub channel_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefreshRequest {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderItemRequest {
    pub sku: Option<String>,
    pub title: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderRequest {
    pub channel_id: i64,
    pub external_order_id: Option<String>,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub shipping_amount: Decimal,
    /// Defaults to the channel's currency.
    pub currency_code: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SummaryResponse {
    from: NaiveDate,
    to: NaiveDate,
    channel_id: Option<i64>,
    #[serde(flatten)]
    overview: SalesOverview,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshResponse {
    from: NaiveDate,
    to: NaiveDate,
    rows_written: u64,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn validate_items(
    rid: &str,
    items: Vec<OrderItemRequest>,
) -> Result<Vec<ChannelOrderItem>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::validation(rid, "an order needs at least one item"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if item.quantity <= 0 {
                return Err(ApiError::validation(
                    rid,
                    format!("items[{i}].quantity must be greater than zero"),
                ));
            }
            if item.unit_price.is_sign_negative() {
                return Err(ApiError::validation(
                    rid,
                    format!("items[{i}].unit_price must not be negative"),
                ));
            }
            let sku = item
                .sku
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(mportal_core::normalize_sku)
                .transpose()
                .map_err(|e| ApiError::validation(rid, format!("items[{i}]: {e}")))?;
            let title = item
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .or_else(|| sku.clone())
                .ok_or_else(|| {
                    ApiError::validation(rid, format!("items[{i}] needs a title or a sku"))
                })?;
            Ok(ChannelOrderItem {
                sku,
                title,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// GET /api/sales/orders
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> Result<Json<ApiResponse<Paginated<OrderRow>>>, ApiError> {
    let rid = &req_id.0;
    if let Some(status) = query.status.as_deref() {
        parse_enum::<OrderStatus>(rid, status)?;
    }
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation(rid, "'from' must not be after 'to'"));
        }
    }

    let pagination = Pagination::new(query.page, query.limit);
    let (items, total) = mportal_db::list_orders(
        &state.pool,
        &OrderFilters {
            channel_id: query.channel_id,
            status: query.status.as_deref(),
            from: query.from.map(start_of),
            to: query
                .to
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(start_of),
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

/// POST /api/sales/orders. Records a hand-entered order; stock is untouched.
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ApiError> {
    let rid = &req_id.0;

    let channel = mportal_db::get_channel_by_id(&state.pool, body.channel_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    let status = body
        .status
        .as_deref()
        .map(|s| parse_enum::<OrderStatus>(rid, s))
        .transpose()?
        .unwrap_or(OrderStatus::Pending);
    let currency_code = validate_currency(
        rid,
        body.currency_code.as_deref().unwrap_or(&channel.currency_code),
    )?;
    if body.tax_amount.is_sign_negative() || body.shipping_amount.is_sign_negative() {
        return Err(ApiError::validation(
            rid,
            "tax_amount and shipping_amount must not be negative",
        ));
    }
    let customer_email = body
        .customer_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(mportal_core::normalize_email)
        .transpose()
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;
    let items = validate_items(rid, body.items)?;

    let order = mportal_db::create_manual_order(
        &state.pool,
        channel.id,
        ManualOrder {
            external_order_id: body.external_order_id,
            order_number: body.order_number,
            customer_name: body.customer_name,
            customer_email,
            status,
            tax_amount: body.tax_amount,
            shipping_amount: body.shipping_amount,
            currency_code,
            ordered_at: body.ordered_at,
            items,
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "order.create",
            entity_type: Some("order"),
            entity_id: Some(order.order.id.to_string()),
            details: json!({
                "channel": channel.code,
                "total_amount": order.order.total_amount,
            }),
        },
    )
    .await;

    Ok((StatusCode::CREATED, respond(&req_id, order)))
}

/// GET /api/sales/orders/{id}
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let order = mportal_db::get_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, order))
}

/// PATCH /api/sales/orders/{id}/status
pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ApiResponse<OrderRow>>, ApiError> {
    let rid = &req_id.0;
    let status = parse_enum::<OrderStatus>(rid, &body.status)?;
    let order = mportal_db::update_order_status(&state.pool, id, status)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "order.status",
            entity_type: Some("order"),
            entity_id: Some(id.to_string()),
            details: json!({ "status": status }),
        },
    )
    .await;

    Ok(respond(&req_id, order))
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// GET /api/sales/summary, computed live from orders.
pub(super) async fn summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<ApiResponse<SummaryResponse>>, ApiError> {
    let rid = &req_id.0;
    let (from, to) = resolve_date_range(rid, query.from, query.to)?;
    let overview = mportal_db::sales_overview(&state.pool, from, to, query.channel_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(
        &req_id,
        SummaryResponse {
            from,
            to,
            channel_id: query.channel_id,
            overview,
        },
    ))
}

/// GET /api/sales/daily, read from the precomputed rollup.
pub(super) async fn daily(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<DailySummaryRow>>>, ApiError> {
    let rid = &req_id.0;
    let (from, to) = resolve_date_range(rid, query.from, query.to)?;
    let rows = mportal_db::list_daily_summary(&state.pool, from, to, query.channel_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, rows))
}

/// GET /api/sales/by-channel
pub(super) async fn by_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<ChannelPerformanceRow>>>, ApiError> {
    let rid = &req_id.0;
    let (from, to) = resolve_date_range(rid, query.from, query.to)?;
    let rows = mportal_db::channel_performance(&state.pool, from, to)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, rows))
}

/// GET /api/sales/top-products
pub(super) async fn top_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<TopProductRow>>>, ApiError> {
    let rid = &req_id.0;
    let (from, to) = resolve_date_range(rid, query.from, query.to)?;
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let rows = mportal_db::top_products(&state.pool, from, to, limit)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, rows))
}

/// POST /api/sales/summary/refresh. Rewrites the rollup for the range.
pub(super) async fn refresh_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(_user): CatalogWriter,
    OptionalJson(body): OptionalJson<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let rid = &req_id.0;
    let (from, to) = resolve_date_range(rid, body.from, body.to)?;
    if (to - from).num_days() >= MAX_REFRESH_DAYS {
        return Err(ApiError::validation(
            rid,
            format!("refresh range must be shorter than {MAX_REFRESH_DAYS} days"),
        ));
    }

    let rows_written = mportal_db::refresh_daily_summary(&state.pool, from, to)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    tracing::info!(%from, %to, rows_written, "daily sales summary refreshed");

    Ok(respond(
        &req_id,
        RefreshResponse {
            from,
            to,
            rows_written,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: Option<&str>, title: Option<&str>, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            sku: sku.map(str::to_owned),
            title: title.map(str::to_owned),
            quantity,
            unit_price: Decimal::new(500, 2),
        }
    }

    #[test]
    fn items_are_normalized_and_titled() {
        let items = validate_items("r", vec![item(Some(" mug red "), None, 2)]).unwrap();
        assert_eq!(items[0].sku.as_deref(), Some("MUG-RED"));
        assert_eq!(items[0].title, "MUG-RED");
        assert_eq!(items[0].line_total(), Decimal::new(1000, 2));
    }

    #[test]
    fn empty_or_invalid_items_are_rejected() {
        assert!(validate_items("r", vec![]).is_err());
        assert!(validate_items("r", vec![item(Some("A"), None, 0)]).is_err());
        assert!(validate_items("r", vec![item(None, Some("  "), 1)]).is_err());
        let err = validate_items("r", vec![item(Some("OK"), None, 1), item(None, None, 1)])
            .unwrap_err();
        assert!(err.error.message.contains("items[1]"));
    }

    #[test]
    fn start_of_is_midnight_utc() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(start_of(day).to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }
}
