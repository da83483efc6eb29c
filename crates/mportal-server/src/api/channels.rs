//! Channel registry, per-channel listings and sync history.

use axum::{extract::State, http::StatusCode, Extension, Json};
use mportal_core::{channels::slugify, ChannelKind, PageMeta, Pagination};
use mportal_db::{
    ChannelProductRow, ChannelRow, ChannelUpdate, NewActivity, NewChannel, SyncLogRow,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::{Admin, CatalogWriter, RequestId};

use super::{
    log_activity, map_db_error, normalize_limit, parse_enum, respond, validate_currency, ApiError,
    ApiJson, ApiPath, ApiQuery, ApiResponse, AppState, Paginated,
};

#[derive(Debug, Deserialize)]
pub(super) struct ChannelListQuery {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateChannelRequest {
    pub name: String,
    pub code: Option<String>,
    pub kind: String,
    pub base_url: Option<String>,
    pub currency_code: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateChannelRequest {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub currency_code: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<Value>,
}

fn validate_code(rid: &str, raw: &str) -> Result<String, ApiError> {
    let code = raw.trim().to_ascii_lowercase();
    let valid = !code.is_empty()
        && code.len() <= 50
        && code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(code)
    } else {
        Err(ApiError::validation(
            rid,
            "code must be 1-50 characters of a-z, 0-9, '-' or '_'",
        ))
    }
}

/// GET /api/channels. `?active=true` hides inactive channels.
pub(super) async fn list_channels(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<ChannelListQuery>,
) -> Result<Json<ApiResponse<Vec<ChannelRow>>>, ApiError> {
    let rows = mportal_db::list_channels(&state.pool, query.active)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, rows))
}

/// POST /api/channels
pub(super) async fn create_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Admin(user): Admin,
    ApiJson(body): ApiJson<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChannelRow>>), ApiError> {
    let rid = &req_id.0;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation(rid, "name must not be empty"));
    }
    let kind = parse_enum::<ChannelKind>(rid, &body.kind)?;
    let code = validate_code(rid, body.code.as_deref().unwrap_or(&slugify(name)))?;
    let currency = validate_currency(
        rid,
        body.currency_code
            .as_deref()
            .unwrap_or(kind.default_currency()),
    )?;

    let channel = mportal_db::create_channel(
        &state.pool,
        &NewChannel {
            name,
            code: &code,
            kind: kind.as_str(),
            base_url: body.base_url.as_deref(),
            currency_code: &currency,
            is_active: body.is_active.unwrap_or(true),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "channel.create",
            entity_type: Some("channel"),
            entity_id: Some(channel.id.to_string()),
            details: json!({ "code": channel.code, "kind": kind }),
        },
    )
    .await;

    Ok((StatusCode::CREATED, respond(&req_id, channel)))
}

/// GET /api/channels/{id}
pub(super) async fn get_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<ChannelRow>>, ApiError> {
    let channel = mportal_db::get_channel_by_id(&state.pool, id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, channel))
}

/// PATCH /api/channels/{id}. `code` and `kind` are immutable.
pub(super) async fn update_channel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateChannelRequest>,
) -> Result<Json<ApiResponse<ChannelRow>>, ApiError> {
    let rid = &req_id.0;

    let name = body.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(ApiError::validation(rid, "name must not be empty"));
    }
    let currency = body
        .currency_code
        .as_deref()
        .map(|c| validate_currency(rid, c))
        .transpose()?;
    if body.settings.as_ref().is_some_and(|s| !s.is_object()) {
        return Err(ApiError::validation(rid, "settings must be a JSON object"));
    }

    let channel = mportal_db::update_channel(
        &state.pool,
        id,
        &ChannelUpdate {
            name,
            base_url: body.base_url.as_deref(),
            currency_code: currency.as_deref(),
            is_active: body.is_active,
            settings: body.settings.as_ref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "channel.update",
            entity_type: Some("channel"),
            entity_id: Some(id.to_string()),
            details: json!({ "code": channel.code, "is_active": channel.is_active }),
        },
    )
    .await;

    Ok(respond(&req_id, channel))
}

/// GET /api/channels/{id}/products
pub(super) async fn list_channel_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<ChannelProductRow>>>, ApiError> {
    let rid = &req_id.0;
    mportal_db::get_channel_by_id(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    let pagination = Pagination::new(query.page, query.limit);
    let (items, total) = mportal_db::list_channel_products(&state.pool, id, pagination)
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

/// GET /api/channels/{id}/sync-logs, newest first.
pub(super) async fn list_sync_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<SyncLogRow>>>, ApiError> {
    let rid = &req_id.0;
    mportal_db::get_channel_by_id(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    let rows = mportal_db::list_sync_logs(&state.pool, Some(id), normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    Ok(respond(&req_id, rows))
}

/// GET /api/sync-logs/{public_id}
pub(super) async fn get_sync_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(public_id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<SyncLogRow>>, ApiError> {
    let row = mportal_db::get_sync_log_by_public_id(&state.pool, public_id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_lowercased_and_restricted() {
        assert_eq!(validate_code("r", " Amazon-CA ").unwrap(), "amazon-ca");
        assert!(validate_code("r", "").is_err());
        assert!(validate_code("r", "best buy").is_err());
        assert!(validate_code("r", &"a".repeat(51)).is_err());
    }
}
