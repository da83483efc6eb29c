//! Registration, login and the current-user endpoint.

use axum::{extract::State, http::StatusCode, Extension, Json};
use mportal_core::Role;
use mportal_db::{NewActivity, NewUser, UserRow};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::middleware::{AuthUser, RequestId};

use super::{log_activity, map_db_error, respond, ApiError, ApiJson, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthPayload {
    token: String,
    user: UserRow,
}

fn issue_token(state: &AppState, rid: &str, user: &UserRow) -> Result<String, ApiError> {
    let role: Role = user.role.parse().map_err(|e| {
        tracing::error!(user_id = user.id, error = %e, "stored user role is invalid");
        ApiError::new(rid, "internal_error", "user role is invalid")
    })?;
    state.jwt.issue(user.id, &user.email, role).map_err(|e| {
        tracing::error!(error = %e, "failed to sign token");
        ApiError::new(rid, "internal_error", "failed to issue token")
    })
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// POST /api/auth/register. The first account becomes admin.
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>), ApiError> {
    let rid = &req_id.0;

    let email = mportal_core::normalize_email(&body.email)
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;
    mportal_core::validate_password(&body.password)
        .map_err(|e| ApiError::validation(rid, e.to_string()))?;

    let password_hash = mportal_core::hash_password(&body.password).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        ApiError::new(rid, "internal_error", "failed to hash password")
    })?;

    let user = mportal_db::register_user(
        &state.pool,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: trimmed(body.first_name.as_deref()),
            last_name: trimmed(body.last_name.as_deref()),
            role: Role::Staff.as_str(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid, &e))?;

    let token = issue_token(&state, rid, &user)?;
    let role = user.role.as_str();
    tracing::info!(user_id = user.id, role, "user registered");

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "user.register",
            entity_type: Some("user"),
            entity_id: Some(user.id.to_string()),
            details: json!({ "role": role }),
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        respond(&req_id, AuthPayload { token, user }),
    ))
}

/// POST /api/auth/login
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthPayload>>, ApiError> {
    let rid = &req_id.0;
    let invalid = || ApiError::new(rid, "unauthorized", "invalid email or password");

    let email = mportal_core::normalize_email(&body.email).map_err(|_| invalid())?;
    let user = mportal_db::get_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| map_db_error(rid, &e))?
        .ok_or_else(invalid)?;

    if !mportal_core::verify_password(&body.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "login rejected: bad password");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::new(rid, "forbidden", "account is disabled"));
    }

    mportal_db::touch_last_login(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    let token = issue_token(&state, rid, &user)?;

    log_activity(
        &state.pool,
        NewActivity {
            user_id: Some(user.id),
            action: "user.login",
            entity_type: Some("user"),
            entity_id: Some(user.id.to_string()),
            details: json!({}),
        },
    )
    .await;

    Ok(respond(&req_id, AuthPayload { token, user }))
}

/// GET /api/auth/me
pub(super) async fn me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserRow>>, ApiError> {
    let row = mportal_db::get_user_by_id(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, row))
}
