use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{authorize, AccessLevel};
use crate::database::models::configuration_item::ConfigurationItemFilter;
use crate::error::ApiError;
use crate::handlers::utils::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, Caller};
use crate::services::ConfigurationItemService;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub id: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub ci_type: Option<String>,
    pub environment: Option<String>,
}

/// Path id wins over `?id=`.
fn target_id(path: Option<Path<String>>, query: &ItemQuery) -> Result<Option<i64>, ApiError> {
    match path.map(|Path(id)| id).or_else(|| query.id.clone()) {
        Some(raw) if !raw.trim().is_empty() => parse_id(&raw).map(Some),
        _ => Ok(None),
    }
}

fn required_id(path: Option<Path<String>>, query: &ItemQuery) -> Result<i64, ApiError> {
    target_id(path, query)?.ok_or_else(|| ApiError::invalid_field("id", "id is required"))
}

/// GET /api/configuration-items[/:id] - List with filters, or one item by id
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    path: Option<Path<String>>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Value> {
    authorize(&state, caller.identity(), AccessLevel::Authenticated).await?;
    let service = ConfigurationItemService::new(state.executor());

    if let Some(ci_id) = target_id(path, &query)? {
        let item = service.get(ci_id).await?;
        return Ok(ApiResponse::success(Value::Object(item)));
    }

    let criteria = ConfigurationItemFilter {
        status: query.status,
        ci_type: query.ci_type,
        environment: query.environment,
    };
    let items = service.list(&criteria).await?;
    Ok(ApiResponse::success(Value::Array(items.into_iter().map(Value::Object).collect())))
}

/// POST /api/configuration-items - Create an item
pub async fn post(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Agent).await?;
    let fields = validation::configuration_item(json_body(payload)?)?;

    let created = ConfigurationItemService::new(state.executor())
        .create(&fields, &authorized.identity.email)
        .await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/configuration-items[/:id] - Replace every mutable field
pub async fn put(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    path: Option<Path<String>>,
    Query(query): Query<ItemQuery>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Agent).await?;
    let ci_id = required_id(path, &query)?;
    let fields = validation::configuration_item(json_body(payload)?)?;

    let updated = ConfigurationItemService::new(state.executor())
        .replace(ci_id, &fields, &authorized.identity.email)
        .await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/configuration-items[/:id] - Delete an unreferenced item
pub async fn delete(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    path: Option<Path<String>>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Value> {
    let authorized = authorize(&state, caller.identity(), AccessLevel::Agent).await?;
    let ci_id = required_id(path, &query)?;

    let deleted = ConfigurationItemService::new(state.executor())
        .delete(ci_id, &authorized.identity.email)
        .await?;
    Ok(ApiResponse::success(deleted))
}
