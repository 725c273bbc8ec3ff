use axum::extract::{Extension, Path, State};
use serde_json::Value;

use crate::auth::{authorize, AccessLevel};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::UserService;
use crate::state::AppState;

/// GET /api/user-roles/impersonate/:email - Effective role of another user
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(email): Path<String>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Admin).await?;

    let data = UserService::new(state.executor())
        .impersonate(email.trim(), &authorized.identity)
        .await?;
    Ok(ApiResponse::success(data))
}
