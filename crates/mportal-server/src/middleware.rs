use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use mportal_core::Role;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, AppState};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The caller behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// An authenticated caller allowed to write catalog, inventory and channel data.
#[derive(Debug, Clone)]
pub struct CatalogWriter(pub AuthUser);

#[derive(Debug, Clone)]
pub struct Admin(pub AuthUser);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    #[must_use]
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

pub(crate) fn request_id_of(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// An incoming `x-request-id` header is reused, otherwise a new `UUIDv4` is
/// generated. The ID is stored as a [`RequestId`] extension and echoed on
/// the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Verifies the bearer JWT, reloads the account it names and stores the
/// caller as an [`AuthUser`] extension.
///
/// Deactivated or deleted accounts are rejected even while their token is
/// still valid, and a changed role applies from the next request.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let rid = request_id_of(req.extensions());

    let Some(token) = extract_bearer_token(req.headers().get(AUTHORIZATION)) else {
        return ApiError::new(rid, "unauthorized", "missing bearer token").into_response();
    };

    let claims = match state.jwt.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return ApiError::new(rid, "unauthorized", "invalid or expired token")
                .into_response();
        }
    };

    let Ok(id) = claims.sub.parse::<i64>() else {
        return ApiError::new(rid, "unauthorized", "invalid token subject").into_response();
    };

    // Role and status come from the account row, not the token.
    let user = match mportal_db::get_user_by_id(&state.pool, id).await {
        Ok(user) if user.is_active => user,
        Ok(_) => return ApiError::new(rid, "forbidden", "account is disabled").into_response(),
        Err(mportal_db::DbError::NotFound) => {
            return ApiError::new(rid, "unauthorized", "account no longer exists").into_response();
        }
        Err(e) => {
            tracing::error!(user_id = id, error = %e, "failed to load token subject");
            return ApiError::new(rid, "internal_error", "failed to load account").into_response();
        }
    };
    let role = match user.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(user_id = id, error = %e, "stored user role is invalid");
            return ApiError::new(rid, "internal_error", "user role is invalid").into_response();
        }
    };
    if role != claims.role {
        tracing::debug!(user_id = id, token_role = %claims.role, %role, "token role is stale");
    }

    req.extensions_mut().insert(AuthUser {
        id,
        email: user.email,
        role,
    });
    next.run(req).await
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;

    if window.started_at.elapsed() >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        let rid = request_id_of(req.extensions());
        return ApiError::new(rid, "rate_limited", "rate limit exceeded").into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            ApiError::new(
                request_id_of(&parts.extensions),
                "unauthorized",
                "authentication required",
            )
        })
    }
}

impl<S> FromRequestParts<S> for CatalogWriter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.can_manage_catalog() {
            return Err(ApiError::new(
                request_id_of(&parts.extensions),
                "forbidden",
                "manager or admin role required",
            ));
        }
        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for Admin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(ApiError::new(
                request_id_of(&parts.extensions),
                "forbidden",
                "admin role required",
            ));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn extract_bearer_token_rejects_blank_token() {
        let header = HeaderValue::from_static("Bearer   ");
        assert_eq!(extract_bearer_token(Some(&header)), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn request_id_of_defaults_to_empty() {
        let mut extensions = axum::http::Extensions::new();
        assert_eq!(request_id_of(&extensions), "");
        extensions.insert(RequestId("req-9".to_string()));
        assert_eq!(request_id_of(&extensions), "req-9");
    }
}
