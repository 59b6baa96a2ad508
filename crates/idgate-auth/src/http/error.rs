//! OAuth error responses.
//!
//! `AuthError` renders as the RFC 6749 error envelope:
//!
//! ```json
//! { "error": "invalid_grant", "error_description": "Redirect URI mismatch" }
//! ```

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::oauth::token::OAuthErrorResponse;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "Request failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Request rejected");
        }

        let body = OAuthErrorResponse::from(&self);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(
                &body.error,
                body.error_description.as_deref().unwrap_or_default(),
            );
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Adds the headers that keep token responses out of caches.
pub(crate) fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="idgate", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!(
        "Bearer realm=\"idgate\", error=\"{}\", error_description=\"{}\"",
        error, escaped_desc
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_token_response() {
        let response = AuthError::invalid_token("Invalid or expired access token").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(www_auth.starts_with("Bearer realm=\"idgate\""));
        assert!(www_auth.contains("error=\"invalid_token\""));

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid_token");
        assert_eq!(json["error_description"], "Invalid or expired access token");
    }

    #[tokio::test]
    async fn test_invalid_grant_has_no_challenge() {
        let response = AuthError::invalid_grant("Redirect URI mismatch").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = AuthError::storage("connection refused on 10.0.0.5:5432").into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "server_error");
        assert!(!json["error_description"].as_str().unwrap().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_unsupported_grant_type_response() {
        let response = AuthError::unsupported_grant_type("password").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "unsupported_grant_type");
        assert_eq!(json["error_description"], "Unsupported grant type");
    }

    #[test]
    fn test_no_store_headers() {
        let response = no_store(StatusCode::OK.into_response());
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    }

    #[test]
    fn test_www_authenticate_header_escaping() {
        let header = build_www_authenticate_header("invalid_client", "Bad \"secret\"");
        assert!(header.contains("\\\"secret\\\""));
    }
}
