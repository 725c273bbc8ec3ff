use serde::Serialize;
use tracing::warn;

use crate::database::models::user::Role;
use crate::error::ApiError;
use crate::services::UserService;
use crate::state::AppState;

use super::identity::{Identity, IdentityError};

/// Capability a route requires. Levels nest: admin satisfies agent, agent
/// satisfies authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Authenticated,
    Agent,
    Admin,
}

impl AccessLevel {
    /// Whether a stored role (or none) meets this level.
    pub fn permits(self, role: Option<Role>) -> bool {
        match self {
            AccessLevel::None | AccessLevel::Authenticated => true,
            AccessLevel::Agent => role.is_some_and(Role::is_agent),
            AccessLevel::Admin => role.is_some_and(Role::is_admin),
        }
    }

    fn needs_role(self) -> bool {
        matches!(self, AccessLevel::Agent | AccessLevel::Admin)
    }
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub identity: Identity,
    /// Stored role, when the store was consulted
    pub role: Option<Role>,
    /// Granted without a role because the user-role tables are missing in
    /// development trust mode
    pub implicit: bool,
}

impl Authorized {
    /// Re-check a stricter level after the initial gate.
    pub fn require(&self, level: AccessLevel) -> Result<(), ApiError> {
        if self.implicit || level.permits(self.role) {
            Ok(())
        } else {
            warn!(email = %self.identity.email, ?level, role = ?self.role, "Access denied");
            Err(ApiError::forbidden(denied_message(level)))
        }
    }
}

fn denied_message(level: AccessLevel) -> &'static str {
    match level {
        AccessLevel::Admin => "Administrator access required",
        _ => "Agent access required",
    }
}

/// Authorize a resolved identity for `level`.
///
/// Agent and admin levels read the caller's active role row. A missing
/// user-role table passes only in development trust mode; any other store
/// failure is an internal error.
pub async fn authorize(
    state: &AppState,
    identity: Result<Identity, IdentityError>,
    level: AccessLevel,
) -> Result<Authorized, ApiError> {
    let identity = identity?;
    if !level.needs_role() {
        return Ok(Authorized { identity, role: None, implicit: false });
    }

    match UserService::new(state.executor()).stored_role(&identity).await {
        Ok(Some(role)) => {
            let authorized = Authorized { identity, role: Some(role), implicit: false };
            authorized.require(level)?;
            Ok(authorized)
        }
        Ok(None) => {
            warn!(email = %identity.email, ?level, "Access denied: no active user role");
            Err(ApiError::forbidden(denied_message(level)))
        }
        Err(e) if e.is_object_not_found() && state.config.trust_mode.is_development() => {
            warn!(email = %identity.email, error = %e, "User-role store unavailable; allowing in development trust mode");
            Ok(Authorized { identity, role: None, implicit: true })
        }
        Err(e) => Err(e.into()),
    }
}
