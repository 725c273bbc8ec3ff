use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{self, unknown_route, unsupported_method};
use crate::middleware::{error_detail_middleware, identity_middleware};
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root).fallback(unsupported_method))
        .route("/health", get(handlers::public::health).fallback(unsupported_method))
        .merge(catalog_routes())
        // Protected
        .merge(configuration_item_routes())
        .merge(user_role_routes())
        // Elevated
        .merge(impersonation_routes())
        .fallback(unknown_route)
        // Global middleware
        .layer(from_fn_with_state(state.clone(), identity_middleware))
        .layer(from_fn_with_state(state.clone(), error_detail_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn catalog_routes() -> Router<AppState> {
    use handlers::public;

    Router::new().route("/api/ci-types", get(public::ci_types_list).fallback(unsupported_method))
}

fn configuration_item_routes() -> Router<AppState> {
    use handlers::protected::configuration_items as items;

    let methods = || {
        get(items::get)
            .post(items::post)
            .put(items::put)
            .delete(items::delete)
            .fallback(unsupported_method)
    };

    Router::new()
        .route("/api/configuration-items", methods())
        .route("/api/configuration-items/:id", methods())
}

fn user_role_routes() -> Router<AppState> {
    use handlers::protected::user_roles;

    Router::new().route(
        "/api/user-roles",
        get(user_roles::get)
            .post(user_roles::post)
            .put(user_roles::put)
            .delete(user_roles::delete)
            .fallback(unsupported_method),
    )
}

fn impersonation_routes() -> Router<AppState> {
    use handlers::elevated;

    Router::new().route(
        "/api/user-roles/impersonate/:email",
        get(elevated::impersonate_get).fallback(unsupported_method),
    )
}
