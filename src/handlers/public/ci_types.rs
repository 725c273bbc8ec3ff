use axum::extract::State;

use crate::database::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::CiTypeService;
use crate::state::AppState;

/// GET /api/ci-types - Active CI types in display order
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Row>> {
    let types = CiTypeService::new(state.executor()).list().await?;
    Ok(ApiResponse::success(types))
}
