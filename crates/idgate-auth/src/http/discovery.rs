//! OpenID Provider discovery and JWKS handlers.
//!
//! - `GET /.well-known/openid-configuration` (OpenID Connect Discovery 1.0)
//! - `GET /.well-known/jwks.json` (RFC 7517)
//!
//! Tokens are signed with a shared HS256 secret, so the key set is always
//! empty; it is published so generic clients find a well-formed document.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use super::AuthState;
use crate::oauth::client_auth::TokenEndpointAuthMethod;
use crate::types::GrantType;

/// Builds the discovery document.
pub fn openid_configuration(state: &AuthState) -> Value {
    let scopes: Vec<&str> = state
        .scopes
        .iter()
        .filter(|s| s.active)
        .map(|s| s.name.as_str())
        .collect();
    let auth_methods: Vec<&str> = TokenEndpointAuthMethod::SUPPORTED
        .iter()
        .map(TokenEndpointAuthMethod::as_str)
        .collect();

    json!({
        "issuer": &*state.issuer,
        "authorization_endpoint": state.url("/oauth/authorize"),
        "token_endpoint": state.url("/oauth/token"),
        "userinfo_endpoint": state.url("/oauth/userinfo"),
        "jwks_uri": state.url("/.well-known/jwks.json"),
        "response_types_supported": ["code"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["HS256"],
        "scopes_supported": scopes,
        "grant_types_supported": [
            GrantType::AuthorizationCode.as_str(),
            GrantType::RefreshToken.as_str(),
        ],
        "token_endpoint_auth_methods_supported": auth_methods,
        "claims_supported": ["sub", "iss", "aud", "exp", "iat", "auth_time", "preferred_username", "email", "email_verified"],
    })
}

/// Handler for `GET /.well-known/openid-configuration`.
pub async fn openid_configuration_handler(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(openid_configuration(&state)),
    )
}

/// Handler for `GET /.well-known/jwks.json`.
///
/// The response may be cached for an hour.
pub async fn jwks_handler(State(state): State<AuthState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Json(state.codec.jwks()),
    )
}
