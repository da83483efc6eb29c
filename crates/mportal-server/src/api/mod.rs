mod activity;
mod auth;
mod channels;
mod integrations;
mod inventory;
mod products;
mod sales;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use mportal_channels::ChannelError;
use mportal_core::{AppConfig, PageMeta};
use mportal_db::{DbError, NewActivity};
use mportal_sync::{SyncEngine, SyncError};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::middleware::{
    enforce_rate_limit, request_id, request_id_of, require_auth, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub sync: SyncEngine,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours);
        let sync = SyncEngine::new(pool.clone());
        Self {
            pool,
            config,
            jwt,
            sync,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// A page of rows plus the paging arithmetic for the client.
#[derive(Debug, Serialize)]
pub(super) struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

/// Wraps `data` in the success envelope.
pub(super) fn respond<T: Serialize>(request_id: &RequestId, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(request_id.0.clone()),
    })
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(super) fn validation(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "bad_gateway" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: &str, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        DbError::Conflict(message) => ApiError::new(request_id, "conflict", message.clone()),
        DbError::InvalidSyncLogTransition { .. } => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        DbError::Inventory(e) => ApiError::validation(request_id, e.to_string()),
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(super) fn map_channel_error(request_id: &str, error: &ChannelError) -> ApiError {
    if let ChannelError::NotConfigured(_) = error {
        return ApiError::new(request_id, "bad_request", error.to_string());
    }
    tracing::warn!(error = %error, kind = error.kind(), "channel request failed");
    ApiError::new(request_id, "bad_gateway", error.to_string())
}

pub(super) fn map_sync_error(request_id: &str, error: &SyncError) -> ApiError {
    match error {
        SyncError::Channel(e) => map_channel_error(request_id, e),
        SyncError::Db(e) => map_db_error(request_id, e),
        SyncError::ChannelInactive(_) | SyncError::KindMismatch { .. } => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
    }
}

/// Appends to the activity log. Failures are logged and never surface to
/// the caller.
pub(super) async fn log_activity(pool: &PgPool, activity: NewActivity<'_>) {
    if let Err(e) = mportal_db::record_activity(pool, &activity).await {
        tracing::warn!(error = %e, action = activity.action, "failed to record activity");
    }
}

/// Uppercases an ISO 4217 style code after checking it is three letters.
pub(super) fn validate_currency(request_id: &str, raw: &str) -> Result<String, ApiError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(ApiError::validation(
            request_id,
            format!("currency_code must be a three-letter code, got '{raw}'"),
        ))
    }
}

/// Parses one of the lowercase domain enums, mapping failures to a 400.
pub(super) fn parse_enum<T>(request_id: &str, raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = mportal_core::CoreError>,
{
    raw.parse::<T>()
        .map_err(|e| ApiError::validation(request_id, e.to_string()))
}

/// Resolves an inclusive date range, defaulting to the 30 days ending today.
pub(super) fn resolve_date_range(
    request_id: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let to = to.unwrap_or_else(|| Utc::now().date_naive());
    let from = from.unwrap_or(to - Duration::days(29));
    if from > to {
        return Err(ApiError::validation(
            request_id,
            format!("'from' ({from}) must not be after 'to' ({to})"),
        ));
    }
    Ok((from, to))
}

/// JSON body extractor whose rejections use the API error envelope.
pub(super) struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let rid = request_id_of(req.extensions());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(&rid, rejection.body_text())),
        }
    }
}

/// Like [`ApiJson`], but an empty body yields `T::default()`.
pub(super) struct OptionalJson<T>(pub T);

impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let rid = request_id_of(req.extensions());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(&rid, rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| ApiError::validation(&rid, format!("invalid JSON body: {e}")))
    }
}

/// Query-string extractor whose rejections use the API error envelope.
pub(super) struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(
                &request_id_of(&parts.extensions),
                rejection.body_text(),
            )),
        }
    }
}

/// Path extractor whose rejections use the API error envelope.
pub(super) struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(
                &request_id_of(&parts.extensions),
                rejection.body_text(),
            )),
        }
    }
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ]);

    if origins.is_empty() {
        return layer.allow_origin(tower_http::cors::Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

fn protected_router(state: AppState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::archive_product),
        )
        .route("/api/products/sku/{sku}", get(products::get_product_by_sku))
        .route(
            "/api/products/{id}/channels/{channel_id}",
            put(products::map_channel).delete(products::unmap_channel),
        )
        .route("/api/inventory", get(inventory::list_inventory))
        .route("/api/inventory/low-stock", get(inventory::list_low_stock))
        .route("/api/inventory/adjust", post(inventory::adjust))
        .route("/api/inventory/reserve", post(inventory::reserve))
        .route("/api/inventory/release", post(inventory::release))
        .route(
            "/api/inventory/{product_id}",
            get(inventory::get_product_inventory),
        )
        .route(
            "/api/inventory/{product_id}/movements",
            get(inventory::list_movements),
        )
        .route(
            "/api/sales/orders",
            get(sales::list_orders).post(sales::create_order),
        )
        .route("/api/sales/orders/{id}", get(sales::get_order))
        .route(
            "/api/sales/orders/{id}/status",
            patch(sales::update_order_status),
        )
        .route("/api/sales/summary", get(sales::summary))
        .route("/api/sales/summary/refresh", post(sales::refresh_summary))
        .route("/api/sales/daily", get(sales::daily))
        .route("/api/sales/by-channel", get(sales::by_channel))
        .route("/api/sales/top-products", get(sales::top_products))
        .route(
            "/api/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/api/channels/{id}",
            get(channels::get_channel).patch(channels::update_channel),
        )
        .route(
            "/api/channels/{id}/products",
            get(channels::list_channel_products),
        )
        .route(
            "/api/channels/{id}/sync-logs",
            get(channels::list_sync_logs),
        )
        .route("/api/sync-logs/{public_id}", get(channels::get_sync_log))
        .route("/api/shopify/test", get(integrations::shopify_test))
        .route("/api/shopify/products", get(integrations::shopify_products))
        .route(
            "/api/shopify/sync/products",
            post(integrations::shopify_sync_products),
        )
        .route(
            "/api/shopify/sync/orders",
            post(integrations::shopify_sync_orders),
        )
        .route("/api/bestbuy/test", get(integrations::bestbuy_test))
        .route("/api/bestbuy/offers", get(integrations::bestbuy_offers))
        .route(
            "/api/bestbuy/sync/products",
            post(integrations::bestbuy_sync_products),
        )
        .route(
            "/api/bestbuy/sync/orders",
            post(integrations::bestbuy_sync_orders),
        )
        .route("/api/activity", get(activity::list_activity))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(state, require_auth)),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let cors = build_cors(&state.config.cors_origins);

    Router::new()
        .merge(public_routes)
        .merge(protected_router(state.clone(), rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

pub fn rate_limit_state(config: &AppConfig) -> RateLimitState {
    RateLimitState::per_minute(config.rate_limit_per_minute)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match mportal_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
