use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::identity::{self, Identity, IdentityError};
use crate::state::AppState;

/// Caller identity as resolved from the request headers.
///
/// Resolution never rejects the request here: routes that need no identity
/// ignore it, and the policy turns an error into 401 for the rest.
#[derive(Clone, Debug)]
pub struct Caller(pub Result<Identity, IdentityError>);

impl Caller {
    pub fn identity(&self) -> Result<Identity, IdentityError> {
        self.0.clone()
    }
}

/// Resolve the caller once per request and inject it as an extension.
pub async fn identity_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let resolved = identity::resolve(request.headers(), &state.config);
    match &resolved {
        Ok(identity) => debug!(email = %identity.email, development = identity.development, "Resolved caller"),
        Err(e) => debug!(error = %e, "No caller identity"),
    }

    request.extensions_mut().insert(Caller(resolved));
    next.run(request).await
}
