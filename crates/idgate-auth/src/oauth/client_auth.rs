//! Client authentication for the token endpoint.
//!
//! # Authentication Methods
//!
//! - `none` - Public clients (client_id only)
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the request body
//!
//! When both Basic Auth and body credentials are present, Basic Auth wins.
//!
//! Every failure is reported as the same `invalid_client` error so a caller
//! cannot tell an unknown client from a wrong secret. The actual reason is
//! logged at debug level.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::crypto::verify_secret;
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::Client;

const AUTHENTICATION_FAILED: &str = "Client authentication failed";

/// Token endpoint authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// No client authentication (public clients).
    None,

    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl TokenEndpointAuthMethod {
    /// All supported methods, as advertised by discovery.
    pub const SUPPORTED: [TokenEndpointAuthMethod; 3] =
        [Self::ClientSecretBasic, Self::ClientSecretPost, Self::None];

    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client credentials as presented on a token request.
#[derive(Clone, Default)]
pub struct ClientCredentials {
    /// Public client identifier.
    pub client_id: Option<String>,
    /// Plaintext secret, if one was presented.
    pub client_secret: Option<String>,
    /// Where the credentials came from.
    pub method: Option<TokenEndpointAuthMethod>,
}

impl ClientCredentials {
    /// Credentials for a public client.
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: None,
            method: Some(TokenEndpointAuthMethod::None),
        }
    }

    /// Credentials sent as form parameters.
    #[must_use]
    pub fn post(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            method: Some(TokenEndpointAuthMethod::ClientSecretPost),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("method", &self.method)
            .finish()
    }
}

/// Resolves client credentials from the `Authorization` header and the form
/// body of a token request.
///
/// # Errors
///
/// Returns `AuthError::InvalidRequest` if the Basic Auth header is malformed
/// or names a different client than the form's `client_id`.
pub fn extract_client_credentials(
    authorization: Option<&str>,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> AuthResult<ClientCredentials> {
    let form_client_id = form_client_id.filter(|id| !id.is_empty());

    if let Some(header) = authorization
        && header
            .trim_start()
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic "))
    {
        let (client_id, client_secret) = parse_basic_auth(header)
            .ok_or_else(|| AuthError::invalid_request("Malformed Basic authorization header"))?;

        if let Some(form_id) = form_client_id
            && form_id != client_id
        {
            return Err(AuthError::invalid_request(
                "client_id does not match Basic authorization credentials",
            ));
        }

        return Ok(ClientCredentials {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
            method: Some(TokenEndpointAuthMethod::ClientSecretBasic),
        });
    }

    let client_secret = form_client_secret.filter(|s| !s.is_empty());
    let method = match (form_client_id, client_secret) {
        (Some(_), Some(_)) => Some(TokenEndpointAuthMethod::ClientSecretPost),
        (Some(_), None) => Some(TokenEndpointAuthMethod::None),
        _ => None,
    };

    Ok(ClientCredentials {
        client_id: form_client_id.map(str::to_string),
        client_secret: client_secret.map(str::to_string),
        method,
    })
}

/// Parses an HTTP Basic Auth header value.
///
/// Both parts are percent-decoded as required by RFC 6749 Section 2.3.1.
///
/// Returns `Some((client_id, client_secret))` if valid, `None` otherwise.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let header_value = header_value.trim();
    let (scheme, encoded) = header_value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Split on first colon (secret may contain colons)
    let (client_id, client_secret) = credentials.split_once(':')?;
    let client_id = urlencoding::decode(client_id).ok()?.into_owned();
    let client_secret = urlencoding::decode(client_secret).ok()?.into_owned();

    if client_id.is_empty() {
        return None;
    }

    Some((client_id, client_secret))
}

/// Authenticates a client.
///
/// - Unknown or inactive clients fail.
/// - Confidential clients must present a non-blank secret matching the
///   stored Argon2 hash.
/// - Public clients succeed whatever secret is presented.
///
/// # Errors
///
/// Returns `AuthError::InvalidClient` on any authentication failure, or a
/// storage error if the lookup fails.
pub async fn authenticate_client(
    client_id: &str,
    client_secret: Option<&str>,
    client_storage: &dyn ClientStorage,
) -> AuthResult<Client> {
    let Some(client) = client_storage.find_by_client_id(client_id).await? else {
        tracing::debug!(client_id = %client_id, "Client authentication failed: unknown client");
        return Err(AuthError::invalid_client(AUTHENTICATION_FAILED));
    };

    if !client.active {
        tracing::debug!(client_id = %client_id, "Client authentication failed: client inactive");
        return Err(AuthError::invalid_client(AUTHENTICATION_FAILED));
    }

    if !client.confidential {
        return Ok(client);
    }

    let secret = client_secret.map(str::trim).filter(|s| !s.is_empty());
    let (Some(secret), Some(hash)) = (secret, client.client_secret_hash.as_deref()) else {
        tracing::debug!(client_id = %client_id, "Client authentication failed: secret missing");
        return Err(AuthError::invalid_client(AUTHENTICATION_FAILED));
    };

    match verify_secret(secret, hash) {
        Ok(true) => Ok(client),
        Ok(false) => {
            tracing::debug!(client_id = %client_id, "Client authentication failed: secret mismatch");
            Err(AuthError::invalid_client(AUTHENTICATION_FAILED))
        }
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "Stored client secret hash is unreadable");
            Err(AuthError::invalid_client(AUTHENTICATION_FAILED))
        }
    }
}
