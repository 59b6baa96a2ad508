//! OAuth 2.0 token endpoint handler.
//!
//! ```text
//! POST /oauth/token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=authorization_code
//! &code=4f1c...
//! &redirect_uri=https://app.example.com/callback
//! ```
//!
//! Success and error responses both carry `Cache-Control: no-store`.

use axum::Form;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::AuthState;
use super::error::no_store;
use crate::error::AuthError;
use crate::oauth::client_auth::extract_client_credentials;
use crate::oauth::token::{TokenRequest, TokenResponse};

/// POST /oauth/token handler.
pub async fn token_handler(
    State(state): State<AuthState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable token request body");
            return no_store(
                AuthError::invalid_request("Request body must be application/x-www-form-urlencoded")
                    .into_response(),
            );
        }
    };

    tracing::debug!(
        grant_type = ?request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let result = match extract_client_credentials(
        authorization,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    ) {
        Ok(credentials) => state.tokens.exchange(&request, credentials).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => token_success_response(response),
        Err(e) => {
            tracing::warn!(
                grant_type = ?request.grant_type,
                error = %e,
                "Token request failed"
            );
            no_store(e.into_response())
        }
    }
}

/// Build a success response for the token endpoint.
fn token_success_response(response: TokenResponse) -> Response {
    (
        StatusCode::OK,
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
        ],
        Json(response),
    )
        .into_response()
}
