use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::auth::AccessLevel;
use crate::database::Statement;
use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> Json<Value> {
    let endpoints: Vec<Value> = [
        ("GET", "/api/configuration-items[/:id]", AccessLevel::Authenticated),
        ("POST, PUT, DELETE", "/api/configuration-items[/:id]", AccessLevel::Agent),
        ("GET", "/api/ci-types", AccessLevel::None),
        ("GET", "/api/user-roles", AccessLevel::Authenticated),
        ("GET", "/api/user-roles?all=true", AccessLevel::Agent),
        ("POST, PUT", "/api/user-roles", AccessLevel::Agent),
        ("DELETE", "/api/user-roles", AccessLevel::Admin),
        ("GET", "/api/user-roles/impersonate/:email", AccessLevel::Admin),
    ]
    .into_iter()
    .map(|(methods, path, access)| json!({ "methods": methods, "path": path, "access": access }))
    .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "CMDB API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Configuration items and user roles for the IT service desk",
            "endpoints": endpoints,
        }
    }))
}

/// GET /health - Database round trip
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.executor().fetch_optional(&Statement::query("SELECT 1 AS ok")).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}
