use axum::{extract::State, Extension, Json};
use mportal_db::ActivityRow;
use serde::Deserialize;

use crate::middleware::{Admin, RequestId};

use super::{map_db_error, normalize_limit, respond, ApiError, ApiQuery, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ActivityQuery {
    pub limit: Option<i64>,
    pub user_id: Option<i64>,
}

/// GET /api/activity, newest first. Admins only.
pub(super) async fn list_activity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Admin(_admin): Admin,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityRow>>>, ApiError> {
    let rows = mportal_db::list_activity(&state.pool, normalize_limit(query.limit), query.user_id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(respond(&req_id, rows))
}
