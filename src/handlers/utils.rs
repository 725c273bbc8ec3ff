use axum::{extract::rejection::JsonRejection, Json};
use serde_json::Value;

use crate::error::ApiError;

/// Unwrap a JSON body, reporting a malformed one in the error envelope.
pub fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(ApiError::validation_error(format!("Invalid JSON body: {}", rejection.body_text()), None)),
    }
}

/// Query flag such as `all=true`.
pub fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref().map(str::trim), Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
}

/// Parse a configuration item id from the path or query string.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid_field("id", "id must be an integer"))
}
