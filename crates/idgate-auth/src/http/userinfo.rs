//! OpenID Connect UserInfo endpoint handlers.
//!
//! The access token is read from `Authorization: Bearer ...` or, failing
//! that, from the `access_token` query parameter.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AuthState;
use crate::oauth::userinfo::extract_bearer;

/// Query parameters accepted by the UserInfo endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UserInfoQuery {
    /// Access token, when not sent in the header.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// GET /oauth/userinfo handler.
pub async fn userinfo_get(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<UserInfoQuery>,
) -> Response {
    respond(&state, &headers, query.access_token.as_deref()).await
}

/// POST /oauth/userinfo handler.
pub async fn userinfo_post(
    State(state): State<AuthState>,
    headers: HeaderMap,
    Query(query): Query<UserInfoQuery>,
) -> Response {
    respond(&state, &headers, query.access_token.as_deref()).await
}

async fn respond(state: &AuthState, headers: &HeaderMap, access_token: Option<&str>) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state
        .userinfo
        .userinfo(extract_bearer(authorization, access_token))
        .await
    {
        Ok(claims) => Json(claims).into_response(),
        Err(e) => e.into_response(),
    }
}
