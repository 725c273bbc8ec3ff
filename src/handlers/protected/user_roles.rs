use axum::{
    extract::{rejection::JsonRejection, Extension, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{authorize, AccessLevel};
use crate::database::models::user::Role;
use crate::error::ApiError;
use crate::handlers::utils::{flag, json_body};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::UserService;
use crate::state::AppState;
use crate::validation::{self, ValidationError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRolesQuery {
    pub all: Option<String>,
    pub include_inactive: Option<String>,
    pub email: Option<String>,
}

/// GET /api/user-roles - Caller's own role, or every user with `all=true`
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<UserRolesQuery>,
) -> ApiResult<Value> {
    let service = UserService::new(state.executor());

    if flag(&query.all) {
        authorize(&state, caller.identity(), AccessLevel::Agent).await?;
        let users = service.list(flag(&query.include_inactive)).await?;
        return Ok(ApiResponse::success(Value::Array(users.into_iter().map(Value::Object).collect())));
    }

    let authorized = authorize(&state, caller.identity(), AccessLevel::Authenticated).await?;
    Ok(ApiResponse::success(service.own_role(&authorized.identity).await?))
}

/// POST /api/user-roles - Create a user; creating an admin needs admin
pub async fn post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Agent).await?;
    let user = validation::new_user(json_body(payload)?)?;
    if user.role == Role::Admin {
        authorized.require(AccessLevel::Admin)?;
    }

    let created = UserService::new(state.executor())
        .create(&user, &authorized.identity.email, state.config.database.atomic_writes)
        .await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/user-roles - Partial update; changing a role needs admin
pub async fn put(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Agent).await?;
    let update = validation::user_update(json_body(payload)?)?;
    if update.role.is_some() {
        authorized.require(AccessLevel::Admin)?;
    }

    let updated = UserService::new(state.executor())
        .update(&update, &authorized.identity.email)
        .await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/user-roles - Deactivate the user named by `?email=` or the body
///
/// Naming yourself is refused before the admin check, so every role gets the
/// same 400.
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<UserRolesQuery>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let identity = authorize(&state, caller.identity(), AccessLevel::Authenticated).await?.identity;

    let from_body = body.and_then(|Json(b)| b.get("email").and_then(Value::as_str).map(str::to_string));
    let email = query
        .email
        .or(from_body)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if let Some(ref email) = email {
        UserService::ensure_not_self(email, &identity)?;
    }

    let authorized = authorize(&state, Ok(identity), AccessLevel::Admin).await?;
    let email = email.ok_or(ApiError::from(ValidationError::MissingField("email")))?;

    let deactivated = UserService::new(state.executor())
        .deactivate(&email, &authorized.identity)
        .await?;
    Ok(ApiResponse::success(deactivated))
}
