//! Stock levels, the movement ledger and manual stock changes.

use axum::{extract::State, Extension, Json};
use mportal_core::{MovementType, PageMeta, Pagination};
use mportal_db::{
    InventoryAdjustment, InventoryFilters, InventoryListRow, InventoryRow, MovementRow, NewActivity,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::middleware::{AuthUser, CatalogWriter, RequestId};

use super::{
    log_activity, map_db_error, normalize_limit, parse_enum, respond, ApiError, ApiJson, ApiPath,
    ApiQuery, ApiResponse, AppState, Paginated,
};

#[derive(Debug, Deserialize)]
pub(super) struct InventoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub product_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LowStockQuery {
    /// Overrides each row's own reorder point.
    pub threshold: Option<i32>,
    pub channel_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MovementQuery {
    pub channel_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AdjustRequest {
    pub product_id: i64,
    pub channel_id: i64,
    #[serde(alias = "change", alias = "quantityChange")]
    pub quantity_change: i32,
    pub movement_type: Option<String>,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReservationRequest {
    pub product_id: i64,
    pub channel_id: i64,
    pub quantity: i32,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StockChange {
    inventory: InventoryRow,
    movement: MovementRow,
}

/// Movement types an operator may record by hand. `sync`, `reserve` and
/// `release` are written by their own code paths.
fn manual_movement_type(rid: &str, raw: Option<&str>) -> Result<MovementType, ApiError> {
    let movement = match raw {
        Some(raw) => parse_enum::<MovementType>(rid, raw)?,
        None => MovementType::Adjustment,
    };
    match movement {
        MovementType::Adjustment
        | MovementType::Sale
        | MovementType::Return
        | MovementType::Restock => Ok(movement),
        other => Err(ApiError::validation(
            rid,
            format!("movement_type '{other}' cannot be recorded manually"),
        )),
    }
}

fn positive_quantity(rid: &str, quantity: i32) -> Result<i32, ApiError> {
    if quantity <= 0 {
        return Err(ApiError::validation(rid, "quantity must be greater than zero"));
    }
    Ok(quantity)
}

/// GET /api/inventory
pub(super) async fn list_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<InventoryQuery>,
) -> Result<Json<ApiResponse<Paginated<InventoryListRow>>>, ApiError> {
    let pagination = Pagination::new(query.page, query.limit);
    let (items, total) = mportal_db::list_inventory(
        &state.pool,
        &InventoryFilters {
            product_id: query.product_id,
            channel_id: query.channel_id,
            search: query.search.as_deref().filter(|s| !s.trim().is_empty()),
        },
        pagination,
    )
    .await
    .map_err(|e| map_db_error(&req_id.0, &e))?;

    Ok(respond(
        &req_id,
        Paginated {
            items,
            pagination: PageMeta::new(pagination, total),
        },
    ))
}

/// GET /api/inventory/low-stock
pub(super) async fn list_low_stock(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<LowStockQuery>,
) -> Result<Json<ApiResponse<Vec<InventoryListRow>>>, ApiError> {
    if query.threshold.is_some_and(|t| t < 0) {
        return Err(ApiError::validation(&req_id.0, "threshold must not be negative"));
    }
    let rows = mportal_db::list_low_stock(&state.pool, query.threshold, query.channel_id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, rows))
}

/// GET /api/inventory/{product_id}: one row per channel that stocks it.
pub(super) async fn get_product_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(product_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<InventoryListRow>>>, ApiError> {
    let rid = &req_id.0;
    mportal_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    let (rows, _total) = mportal_db::list_inventory(
        &state.pool,
        &InventoryFilters {
            product_id: Some(product_id),
            ..InventoryFilters::default()
        },
        Pagination::new(Some(1), Some(200)),
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, rows))
}

/// GET /api/inventory/{product_id}/movements, newest first.
pub(super) async fn list_movements(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(product_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MovementQuery>,
) -> Result<Json<ApiResponse<Vec<MovementRow>>>, ApiError> {
    let rows = mportal_db::list_movements(
        &state.pool,
        product_id,
        query.channel_id,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, rows))
}

/// POST /api/inventory/adjust
pub(super) async fn adjust(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    ApiJson(body): ApiJson<AdjustRequest>,
) -> Result<Json<ApiResponse<StockChange>>, ApiError> {
    let rid = &req_id.0;
    let movement_type = manual_movement_type(rid, body.movement_type.as_deref())?;

    let (inventory, movement) = mportal_db::adjust_inventory(
        &state.pool,
        &InventoryAdjustment {
            product_id: body.product_id,
            channel_id: body.channel_id,
            change: body.quantity_change,
            movement_type,
            reason: body.reason.as_deref(),
            reference: body.reference.as_deref(),
            user_id: Some(user.id),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    tracing::info!(
        product_id = body.product_id,
        channel_id = body.channel_id,
        change = body.quantity_change,
        movement_type = %movement_type,
        "inventory adjusted"
    );
    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "inventory.adjust",
            entity_type: Some("inventory"),
            entity_id: Some(inventory.id.to_string()),
            details: json!({
                "product_id": body.product_id,
                "channel_id": body.channel_id,
                "change": body.quantity_change,
                "movement_type": movement_type,
                "quantity_after": inventory.quantity,
            }),
        },
    )
    .await;

    Ok(respond(&req_id, StockChange { inventory, movement }))
}

/// POST /api/inventory/reserve
pub(super) async fn reserve(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: AuthUser,
    ApiJson(body): ApiJson<ReservationRequest>,
) -> Result<Json<ApiResponse<StockChange>>, ApiError> {
    let rid = &req_id.0;
    let quantity = positive_quantity(rid, body.quantity)?;

    let (inventory, movement) = mportal_db::reserve_inventory(
        &state.pool,
        body.product_id,
        body.channel_id,
        quantity,
        body.reference.as_deref(),
        Some(user.id),
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "inventory.reserve",
            entity_type: Some("inventory"),
            entity_id: Some(inventory.id.to_string()),
            details: json!({ "quantity": quantity, "reference": body.reference }),
        },
    )
    .await;

    Ok(respond(&req_id, StockChange { inventory, movement }))
}

/// POST /api/inventory/release
pub(super) async fn release(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: AuthUser,
    ApiJson(body): ApiJson<ReservationRequest>,
) -> Result<Json<ApiResponse<StockChange>>, ApiError> {
    let rid = &req_id.0;
    let quantity = positive_quantity(rid, body.quantity)?;

    let (inventory, movement) = mportal_db::release_inventory(
        &state.pool,
        body.product_id,
        body.channel_id,
        quantity,
        body.reference.as_deref(),
        Some(user.id),
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "inventory.release",
            entity_type: Some("inventory"),
            entity_id: Some(inventory.id.to_string()),
            details: json!({ "quantity": quantity, "reference": body.reference }),
        },
    )
    .await;

    Ok(respond(&req_id, StockChange { inventory, movement }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_movement_type_defaults_to_adjustment() {
        assert_eq!(
            manual_movement_type("r", None).unwrap(),
            MovementType::Adjustment
        );
        assert_eq!(
            manual_movement_type("r", Some("Restock")).unwrap(),
            MovementType::Restock
        );
    }

    #[test]
    fn system_movement_types_are_not_manual() {
        for raw in ["sync", "reserve", "release"] {
            let err = manual_movement_type("r", Some(raw)).unwrap_err();
            assert_eq!(err.error.code, "validation_error", "{raw}");
        }
        assert!(manual_movement_type("r", Some("teleport")).is_err());
    }

    #[test]
    fn reservations_need_a_positive_quantity() {
        assert!(positive_quantity("r", 0).is_err());
        assert!(positive_quantity("r", -3).is_err());
        assert_eq!(positive_quantity("r", 2).unwrap(), 2);
    }
}
