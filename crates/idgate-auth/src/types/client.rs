//! OAuth 2.0 client domain types.
//!
//! This module defines the `Client` struct, the grant types a client may be
//! registered for, and the explicit input DTO used by admin registration.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Only `authorization_code` and `refresh_token` are executed by the token
/// endpoint; the others may be declared on a client but are rejected as
/// unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
    /// Client Credentials flow (declared only).
    ClientCredentials,
    /// Implicit flow (declared only).
    Implicit,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
            Self::Implicit => "implicit",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GrantType {
    type Err = ClientValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            "client_credentials" => Ok(Self::ClientCredentials),
            "implicit" => Ok(Self::Implicit),
            other => Err(ClientValidationError::UnknownGrantType(other.to_string())),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
///
/// The secret hash is skipped on serialization so a `Client` can be handed to
/// any external representation without leaking it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Internal identifier.
    pub id: Uuid,

    /// Public client identifier used in OAuth flows.
    pub client_id: String,

    /// Argon2id hash of the client secret (confidential clients only).
    #[serde(default, skip_serializing)]
    pub client_secret_hash: Option<String>,

    /// Human-readable display name.
    pub name: String,

    /// Allowed redirect URIs, compared by exact string match.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,

    /// Scopes associated with the client. Informational; requested scopes are
    /// taken per request.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this client can keep a secret.
    pub confidential: bool,

    /// Whether this client is currently active and can be used.
    pub active: bool,

    /// When the client was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the client was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Client {
    /// Validates the client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is invalid.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.name.trim().is_empty() {
            return Err(ClientValidationError::EmptyName);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if self.confidential && self.client_secret_hash.is_none() {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        for uri in &self.redirect_uris {
            url::Url::parse(uri)
                .map_err(|_| ClientValidationError::InvalidRedirectUri(uri.clone()))?;
        }

        Ok(())
    }

    /// Checks if the given redirect URI is registered for this client.
    ///
    /// Exact match only; no prefix or pattern matching.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Input for registering a new client.
///
/// The only fields an administrator can set; identifiers and secrets are
/// always generated server-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistrationRequest {
    /// Display name.
    pub name: String,

    /// Redirect URIs to register.
    pub redirect_uris: Vec<String>,

    /// Grant types; defaults to authorization_code + refresh_token.
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,

    /// Scopes associated with the client.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether to generate a secret for this client.
    #[serde(default = "default_true")]
    pub confidential: bool,

    /// Whether the client is usable immediately.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
}

fn default_true() -> bool {
    true
}

impl ClientRegistrationRequest {
    /// Creates a confidential registration with the default grant types.
    #[must_use]
    pub fn new(name: impl Into<String>, redirect_uris: Vec<String>) -> Self {
        Self {
            name: name.into(),
            redirect_uris,
            grant_types: default_grant_types(),
            scopes: Vec::new(),
            confidential: true,
            active: true,
        }
    }

    /// Makes the client public (no secret).
    #[must_use]
    pub fn public(mut self) -> Self {
        self.confidential = false;
        self
    }

    /// Sets the associated scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

/// Result of a registration: the stored client and, for confidential
/// clients, the plaintext secret. The secret is not recoverable afterwards.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    /// The stored client.
    pub client: Client,
    /// Plaintext secret, shown once.
    pub client_secret: Option<String>,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Client name cannot be empty.
    #[error("Client name cannot be empty")]
    EmptyName,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,

    /// A redirect URI is not an absolute URL.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Confidential clients require a client secret.
    #[error("Confidential clients require a client secret")]
    MissingSecret,

    /// Unrecognized grant type name.
    #[error("Unknown grant type: {0}")]
    UnknownGrantType(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(confidential: bool) -> Client {
        let now = OffsetDateTime::now_utc();
        Client {
            id: Uuid::new_v4(),
            client_id: "c1".to_string(),
            client_secret_hash: confidential.then(|| "$argon2id$hash".to_string()),
            name: "Test Client".to_string(),
            redirect_uris: vec!["https://example.com/callback".to_string()],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            scopes: vec![],
            confidential,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_clients() {
        assert!(make_client(true).validate().is_ok());
        assert!(make_client(false).validate().is_ok());
    }

    #[test]
    fn test_confidential_without_secret_is_invalid() {
        let mut client = make_client(true);
        client.client_secret_hash = None;
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::MissingSecret)
        ));
    }

    #[test]
    fn test_authorization_code_requires_redirect_uri() {
        let mut client = make_client(false);
        client.redirect_uris.clear();
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::NoRedirectUris)
        ));
    }

    #[test]
    fn test_relative_redirect_uri_is_invalid() {
        let mut client = make_client(false);
        client.redirect_uris = vec!["/callback".to_string()];
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::InvalidRedirectUri(_))
        ));
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = make_client(false);
        assert!(client.is_redirect_uri_allowed("https://example.com/callback"));
        assert!(!client.is_redirect_uri_allowed("https://example.com/callback/"));
        assert!(!client.is_redirect_uri_allowed("https://example.com/callback?x=1"));
        assert!(!client.is_redirect_uri_allowed("https://example.com"));
    }

    #[test]
    fn test_secret_hash_not_serialized() {
        let json = serde_json::to_value(make_client(true)).unwrap();
        assert!(json.get("clientSecretHash").is_none());
        assert_eq!(json["clientId"], "c1");
        assert_eq!(json["grantTypes"][0], "authorization_code");
    }

    #[test]
    fn test_grant_type_parse() {
        assert_eq!(
            "refresh_token".parse::<GrantType>().unwrap(),
            GrantType::RefreshToken
        );
        assert!("password".parse::<GrantType>().is_err());
        assert_eq!(GrantType::AuthorizationCode.to_string(), "authorization_code");
    }

    #[test]
    fn test_registration_defaults() {
        let req: ClientRegistrationRequest = serde_json::from_value(serde_json::json!({
            "name": "App",
            "redirectUris": ["https://app.example.com/cb"],
        }))
        .unwrap();
        assert!(req.confidential);
        assert!(req.active);
        assert_eq!(
            req.grant_types,
            vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
        );
    }
}
