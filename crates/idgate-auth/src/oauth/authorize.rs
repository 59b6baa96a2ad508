//! Authorization endpoint flow.
//!
//! # OAuth 2.0 Authorization Code Flow
//!
//! 1. Client redirects the user to `/oauth/authorize`
//! 2. If nobody is signed in, the request is parked in the browser session
//!    and the user is sent to the login page; after login it is replayed
//! 3. The user approves or denies on the consent page
//! 4. The user is redirected back with `code` (approved) or
//!    `error=access_denied` (denied)
//!
//! Redirect URIs are compared by exact string match. The redirect back to
//! the client only ever targets a URI registered for that client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::codes::AuthorizationCodeStore;
use crate::storage::ClientStorage;
use crate::types::{Client, parse_scopes};

/// An authorization request, as received and as parked across login.
///
/// All fields are optional so that a request with missing parameters can
/// still be represented and rejected with a precise error.
///
/// # Example
///
/// ```ignore
/// GET /oauth/authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=openid profile
///   &state=abc123xyz
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Must be "code".
    #[serde(default)]
    pub response_type: Option<String>,

    /// Client identifier.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Redirect URI; must exactly match a registered URI.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Requested scopes (space-separated).
    #[serde(default)]
    pub scope: Option<String>,

    /// Opaque client state, echoed back on the redirect.
    #[serde(default)]
    pub state: Option<String>,

    /// PKCE code challenge. Stored with the code, not verified.
    #[serde(default)]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

impl PendingAuthorization {
    /// Renders the request as a query string for replaying it against the
    /// authorization endpoint.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in [
            ("response_type", &self.response_type),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("scope", &self.scope),
            ("state", &self.state),
            ("code_challenge", &self.code_challenge),
            ("code_challenge_method", &self.code_challenge_method),
        ] {
            if let Some(value) = value {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    /// Requested scopes, parsed.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(self.scope.as_deref().unwrap_or_default())
    }
}

/// What the caller must do next with an authorization request.
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Nobody is signed in. Park the request and send the user to login.
    LoginRequired(PendingAuthorization),

    /// Show the consent page.
    ConsentRequired(ConsentPrompt),
}

/// Everything the consent page needs to render and post back.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentPrompt {
    /// Client identifier.
    pub client_id: String,
    /// Client display name.
    pub client_name: String,
    /// Validated redirect URI.
    pub redirect_uri: String,
    /// Client state, if sent.
    pub state: Option<String>,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// PKCE code challenge, carried through the consent form.
    pub code_challenge: Option<String>,
    /// PKCE code challenge method.
    pub code_challenge_method: Option<String>,
}

/// The user's answer on the consent page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsentDecision {
    /// Client identifier.
    pub client_id: Option<String>,
    /// Redirect URI from the consent form.
    pub redirect_uri: Option<String>,
    /// Client state, if any.
    pub state: Option<String>,
    /// `"1"` approves; anything else denies.
    pub approved: Option<String>,
    /// Scopes to grant.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// PKCE code challenge.
    pub code_challenge: Option<String>,
    /// PKCE code challenge method.
    pub code_challenge_method: Option<String>,
}

impl ConsentDecision {
    /// Returns `true` if the user approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approved.as_deref() == Some("1")
    }
}

/// Drives an authorization request from validation to the final redirect.
#[derive(Clone)]
pub struct AuthorizationFlow {
    clients: Arc<dyn ClientStorage>,
    codes: AuthorizationCodeStore,
}

impl AuthorizationFlow {
    /// Creates a new flow.
    #[must_use]
    pub fn new(clients: Arc<dyn ClientStorage>, codes: AuthorizationCodeStore) -> Self {
        Self { clients, codes }
    }

    /// Validates an authorization request.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if a required parameter is missing, the response
    ///   type is not `code`, or the redirect URI is not registered
    /// - `InvalidClient` if the client is unknown or inactive
    pub async fn authorize(
        &self,
        request: &PendingAuthorization,
        user_id: Option<Uuid>,
    ) -> AuthResult<AuthorizeOutcome> {
        let (Some(response_type), Some(client_id), Some(redirect_uri)) = (
            non_empty(&request.response_type),
            non_empty(&request.client_id),
            non_empty(&request.redirect_uri),
        ) else {
            return Err(AuthError::invalid_request(
                "Missing required parameters: response_type, client_id, redirect_uri",
            ));
        };

        if response_type != "code" {
            return Err(AuthError::invalid_request(
                "Unsupported response_type. Only \"code\" is supported.",
            ));
        }

        let client = self.resolve_client(client_id, redirect_uri).await?;

        if user_id.is_none() {
            tracing::debug!(client_id = %client_id, "Authorization suspended for login");
            return Ok(AuthorizeOutcome::LoginRequired(request.clone()));
        }

        Ok(AuthorizeOutcome::ConsentRequired(ConsentPrompt {
            client_id: client.client_id,
            client_name: client.name,
            redirect_uri: redirect_uri.to_string(),
            state: non_empty(&request.state).map(str::to_string),
            scopes: request.scopes(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
        }))
    }

    /// Applies the user's consent decision and returns the redirect target.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if parameters are missing or the redirect URI is
    ///   not registered for the client
    /// - `InvalidClient` if the client is unknown or inactive
    /// - a storage error if the code cannot be persisted
    pub async fn handle_consent(
        &self,
        decision: &ConsentDecision,
        user_id: Uuid,
    ) -> AuthResult<Url> {
        let (Some(client_id), Some(redirect_uri)) = (
            non_empty(&decision.client_id),
            non_empty(&decision.redirect_uri),
        ) else {
            return Err(AuthError::invalid_request("Missing required parameters"));
        };

        // The consent form is user-controlled; validate it again.
        let client = self.resolve_client(client_id, redirect_uri).await?;

        let mut target = Url::parse(redirect_uri)
            .map_err(|_| AuthError::invalid_request("Invalid redirect_uri"))?;
        let state = non_empty(&decision.state);

        if !decision.is_approved() {
            tracing::info!(client_id = %client.client_id, user_id = %user_id, "Authorization denied by user");
            {
                let mut query = target.query_pairs_mut();
                query
                    .append_pair("error", "access_denied")
                    .append_pair("error_description", "User denied authorization");
                if let Some(state) = state {
                    query.append_pair("state", state);
                }
            }
            return Ok(target);
        }

        let mut scopes: Vec<String> = Vec::new();
        for scope in &decision.scopes {
            for name in parse_scopes(scope) {
                if !scopes.contains(&name) {
                    scopes.push(name);
                }
            }
        }

        let code = self
            .codes
            .issue(
                &client.client_id,
                user_id,
                redirect_uri,
                scopes,
                decision.code_challenge.clone(),
                decision.code_challenge_method.clone(),
            )
            .await?;

        tracing::info!(client_id = %client.client_id, user_id = %user_id, "Authorization granted");
        {
            let mut query = target.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(target)
    }

    async fn resolve_client(&self, client_id: &str, redirect_uri: &str) -> AuthResult<Client> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("Invalid client_id"))?;

        if !client.active {
            return Err(AuthError::invalid_client("Client is not active"));
        }

        if !client.is_redirect_uri_allowed(redirect_uri) {
            tracing::warn!(client_id = %client_id, "Rejected unregistered redirect_uri");
            return Err(AuthError::invalid_request("Invalid redirect_uri"));
        }

        Ok(client)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
