//! Shopify and Best Buy endpoints: connection probes, fetch previews and
//! on-demand sync runs.

use axum::{extract::State, Extension, Json};
use mportal_channels::{Batch, ChannelConnector, ChannelError, ConnectionReport};
use mportal_core::{ChannelKind, ChannelProductRecord};
use mportal_db::{ChannelRow, NewActivity};
use mportal_sync::{SyncOptions, SyncReport, SyncType, TriggerSource};
use serde::Deserialize;
use serde_json::json;

use crate::middleware::{AuthUser, CatalogWriter, RequestId};

use super::{
    log_activity, map_channel_error, map_db_error, map_sync_error, respond, ApiError, ApiQuery,
    ApiResponse, AppState, OptionalJson,
};

#[derive(Debug, Default, Deserialize)]
pub(super) struct SyncRequest {
    /// Page size requested from the channel; defaults to the configured value.
    pub limit: Option<u32>,
    /// Channel code to sync into. Defaults to the first active channel of
    /// the platform's kind.
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PreviewQuery {
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

async fn probe(state: &AppState, kind: ChannelKind) -> ConnectionReport {
    match ChannelConnector::for_kind(kind, &state.config) {
        Ok(connector) => connector.test_connection().await,
        Err(ChannelError::NotConfigured(platform)) => ConnectionReport::not_configured(platform),
        Err(e) => ConnectionReport::from_error(kind.as_str(), None, &e),
    }
}

fn connector_for(
    state: &AppState,
    rid: &str,
    kind: ChannelKind,
) -> Result<ChannelConnector, ApiError> {
    ChannelConnector::for_kind(kind, &state.config).map_err(|e| map_channel_error(rid, &e))
}

fn preview_limit(state: &AppState, limit: Option<u32>) -> u32 {
    limit.unwrap_or(state.config.sync_default_limit)
}

/// The channel a sync writes into: the named one, or the first active
/// channel of `kind`.
async fn target_channel(
    state: &AppState,
    rid: &str,
    kind: ChannelKind,
    code: Option<&str>,
) -> Result<ChannelRow, ApiError> {
    if let Some(code) = code {
        return mportal_db::get_channel_by_code(&state.pool, code.trim())
            .await
            .map_err(|e| map_db_error(rid, &e));
    }

    mportal_db::list_channels(&state.pool, true)
        .await
        .map_err(|e| map_db_error(rid, &e))?
        .into_iter()
        .find(|c| c.kind == kind.as_str())
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "bad_request",
                format!("no active {kind} channel is registered"),
            )
        })
}

async fn run_sync(
    state: &AppState,
    req_id: &RequestId,
    user: &AuthUser,
    kind: ChannelKind,
    sync_type: SyncType,
    body: SyncRequest,
) -> Result<SyncReport, ApiError> {
    let rid = &req_id.0;
    let channel = target_channel(state, rid, kind, body.channel.as_deref()).await?;
    let connector =
        ChannelConnector::for_channel(kind, channel.base_url.as_deref(), &state.config)
            .map_err(|e| map_channel_error(rid, &e))?;
    let options = SyncOptions {
        limit: body.limit.unwrap_or(state.config.sync_default_limit),
        trigger: TriggerSource::Api,
        user_id: Some(user.id),
    };

    tracing::info!(
        channel = %channel.code,
        sync_type = sync_type.as_str(),
        limit = options.limit,
        user_id = user.id,
        "sync requested"
    );
    let result = match sync_type {
        SyncType::Products => state.sync.sync_products(&channel, &connector, &options).await,
        SyncType::Orders => state.sync.sync_orders(&channel, &connector, &options).await,
    };
    let report = result.map_err(|e| map_sync_error(rid, &e))?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: match sync_type {
                SyncType::Products => "sync.products",
                SyncType::Orders => "sync.orders",
            },
            entity_type: Some("channel"),
            entity_id: Some(channel.id.to_string()),
            details: json!({
                "sync_id": report.sync_id,
                "status": report.status,
                "processed": report.processed,
                "failed": report.failed,
            }),
        },
    )
    .await;

    Ok(report)
}

// ---------------------------------------------------------------------------
// Shopify
// ---------------------------------------------------------------------------

/// GET /api/shopify/test
pub(super) async fn shopify_test(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ConnectionReport>> {
    respond(&req_id, probe(&state, ChannelKind::Shopify).await)
}

/// GET /api/shopify/products. Normalized records only; nothing is written.
pub(super) async fn shopify_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<PreviewQuery>,
) -> Result<Json<ApiResponse<Batch<ChannelProductRecord>>>, ApiError> {
    let rid = &req_id.0;
    let connector = connector_for(&state, rid, ChannelKind::Shopify)?;
    let batch = connector
        .fetch_product_records(
            preview_limit(&state, query.limit),
            ChannelKind::Shopify.default_currency(),
        )
        .await
        .map_err(|e| map_channel_error(rid, &e))?;
    Ok(respond(&req_id, batch))
}

/// POST /api/shopify/sync/products
pub(super) async fn shopify_sync_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    OptionalJson(body): OptionalJson<SyncRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = run_sync(
        &state,
        &req_id,
        &user,
        ChannelKind::Shopify,
        SyncType::Products,
        body,
    )
    .await?;
    Ok(respond(&req_id, report))
}

/// POST /api/shopify/sync/orders
pub(super) async fn shopify_sync_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    OptionalJson(body): OptionalJson<SyncRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = run_sync(
        &state,
        &req_id,
        &user,
        ChannelKind::Shopify,
        SyncType::Orders,
        body,
    )
    .await?;
    Ok(respond(&req_id, report))
}

// ---------------------------------------------------------------------------
// Best Buy
// ---------------------------------------------------------------------------

/// GET /api/bestbuy/test
pub(super) async fn bestbuy_test(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ConnectionReport>> {
    respond(&req_id, probe(&state, ChannelKind::BestBuy).await)
}

/// GET /api/bestbuy/offers. Normalized records only; nothing is written.
pub(super) async fn bestbuy_offers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<PreviewQuery>,
) -> Result<Json<ApiResponse<Batch<ChannelProductRecord>>>, ApiError> {
    let rid = &req_id.0;
    let connector = connector_for(&state, rid, ChannelKind::BestBuy)?;
    let batch = connector
        .fetch_product_records(
            preview_limit(&state, query.limit),
            ChannelKind::BestBuy.default_currency(),
        )
        .await
        .map_err(|e| map_channel_error(rid, &e))?;
    Ok(respond(&req_id, batch))
}

/// POST /api/bestbuy/sync/products
pub(super) async fn bestbuy_sync_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    OptionalJson(body): OptionalJson<SyncRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = run_sync(
        &state,
        &req_id,
        &user,
        ChannelKind::BestBuy,
        SyncType::Products,
        body,
    )
    .await?;
    Ok(respond(&req_id, report))
}

/// POST /api/bestbuy/sync/orders
pub(super) async fn bestbuy_sync_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CatalogWriter(user): CatalogWriter,
    OptionalJson(body): OptionalJson<SyncRequest>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = run_sync(
        &state,
        &req_id,
        &user,
        ChannelKind::BestBuy,
        SyncType::Orders,
        body,
    )
    .await?;
    Ok(respond(&req_id, report))
}
