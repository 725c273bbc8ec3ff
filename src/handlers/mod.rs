// handlers/mod.rs - Handlers grouped by the access level their routes need
//
// Public (no identity) → Protected (authenticated or agent) → Elevated (admin)
pub mod public;
pub mod protected;
pub mod elevated;
pub mod utils;

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Method fallback for every known route. Bare `OPTIONS` requests get an
/// empty 200; anything else is a JSON 405.
pub async fn unsupported_method(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    ApiError::method_not_allowed(format!("Method {} not allowed", method)).into_response()
}

/// Router fallback for paths no route matches.
pub async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
