use axum::http::HeaderMap;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

/// Standard alphabet; accepts the principal with or without trailing `=`.
const PRINCIPAL_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Resolved caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub email: String,
    pub external_id: Option<String>,
    pub provider: Option<String>,
    /// Substituted development identity rather than a decoded principal
    pub development: bool,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentityError {
    #[error("Authentication required")]
    Missing,

    #[error("Invalid authentication header encoding")]
    Encoding,

    #[error("Invalid client principal: {0}")]
    Principal(String),

    #[error("Client principal carries no user identity")]
    Anonymous,
}

/// Client principal as forwarded by the hosting platform.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientPrincipal {
    identity_provider: Option<String>,
    user_id: Option<String>,
    user_details: Option<String>,
}

/// Resolve the caller from the configured identity header.
///
/// An absent (or empty) header yields the development identity only when the
/// process runs in development trust mode.
pub fn resolve(headers: &HeaderMap, config: &AppConfig) -> Result<Identity, IdentityError> {
    let raw = match headers.get(config.security.identity_header.as_str()) {
        Some(value) => value.to_str().map_err(|_| IdentityError::Encoding)?.trim(),
        None => "",
    };

    if !raw.is_empty() {
        return decode_principal(raw);
    }

    if config.trust_mode.is_development() {
        let dev = &config.security.dev_identity;
        return Ok(Identity {
            email: dev.email.clone(),
            external_id: Some(dev.external_id.clone()),
            provider: None,
            development: true,
        });
    }

    Err(IdentityError::Missing)
}

/// Decode a base64 JSON client principal.
pub fn decode_principal(encoded: &str) -> Result<Identity, IdentityError> {
    let bytes = PRINCIPAL_ENGINE
        .decode(encoded.trim())
        .map_err(|e| IdentityError::Principal(e.to_string()))?;
    let principal: ClientPrincipal =
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::Principal(e.to_string()))?;

    let email = principal
        .user_details
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(IdentityError::Anonymous)?;

    Ok(Identity {
        email,
        external_id: principal.user_id.filter(|s| !s.trim().is_empty()),
        provider: principal.identity_provider,
        development: false,
    })
}
