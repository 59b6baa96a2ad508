//! Authentication and authorization error types.
//!
//! Every fallible operation in the engine returns [`AuthError`]. Variants map
//! one-to-one onto the OAuth 2.0 error codes that leave the server, plus a
//! handful of server-side variants (storage, configuration, provider) whose
//! details are only ever logged.

use std::fmt;

use axum::http::StatusCode;

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is unknown, inactive, or failed authentication.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization code or refresh token is invalid, expired, used, or revoked,
    /// or was issued to another client or redirect URI.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The bearer access token is missing, malformed, expired, or its subject is gone.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token endpoint does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// End-user authentication failed (bad password, disabled account).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the user is unauthorized.
        message: String,
    },

    /// A user with this username already exists.
    #[error("Username '{username}' already exists")]
    UsernameTaken {
        /// The taken username.
        username: String,
    },

    /// The external identity is already linked to a different local user.
    #[error("Social account {provider} is already linked to another user")]
    AccountAlreadyLinked {
        /// The provider name.
        provider: String,
    },

    /// The external identity provider failed or returned an error.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider {
        /// The identity provider name.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `UsernameTaken` error.
    #[must_use]
    pub fn username_taken(username: impl Into<String>) -> Self {
        Self::UsernameTaken {
            username: username.into(),
        }
    }

    /// Creates a new `AccountAlreadyLinked` error.
    #[must_use]
    pub fn account_already_linked(provider: impl Into<String>) -> Self {
        Self::AccountAlreadyLinked {
            provider: provider.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::InvalidClient { .. }
                | Self::InvalidGrant { .. }
                | Self::InvalidToken { .. }
                | Self::UnsupportedGrantType { .. }
                | Self::Unauthorized { .. }
                | Self::UsernameTaken { .. }
                | Self::AccountAlreadyLinked { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
                | Self::IdentityProvider { .. }
        )
    }

    /// Returns `true` if this is an authentication error.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Authentication)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } => ErrorCategory::Protocol,
            Self::UnsupportedGrantType { .. } => ErrorCategory::Protocol,
            Self::UsernameTaken { .. } => ErrorCategory::Protocol,
            Self::InvalidClient { .. } => ErrorCategory::Authentication,
            Self::InvalidGrant { .. } => ErrorCategory::Authentication,
            Self::InvalidToken { .. } => ErrorCategory::Authentication,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::AccountAlreadyLinked { .. } => ErrorCategory::Integrity,
            Self::Storage { .. } => ErrorCategory::Integrity,
            Self::Configuration { .. } => ErrorCategory::Integrity,
            Self::Internal { .. } => ErrorCategory::Integrity,
            Self::IdentityProvider { .. } => ErrorCategory::ExternalProvider,
        }
    }

    /// Returns the HTTP status this error is rendered with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClient { .. } | Self::InvalidToken { .. } | Self::Unauthorized { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidRequest { .. }
            | Self::InvalidGrant { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::UsernameTaken { .. }
            | Self::AccountAlreadyLinked { .. } => StatusCode::BAD_REQUEST,
            Self::IdentityProvider { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidToken { .. } => "invalid_token",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::UsernameTaken { .. } => "invalid_request",
            Self::Unauthorized { .. } => "access_denied",
            Self::AccountAlreadyLinked { .. } => "access_denied",
            Self::IdentityProvider { .. } => "server_error",
            Self::Storage { .. } => "server_error",
            Self::Configuration { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }

    /// Returns the description that may be shown to the caller.
    ///
    /// Server-side failures collapse to a generic message so storage details,
    /// provider payloads and configuration values never reach a response body.
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidToken { message }
            | Self::Unauthorized { message } => message.clone(),
            Self::UnsupportedGrantType { .. } => "Unsupported grant type".to_string(),
            Self::UsernameTaken { .. } => self.to_string(),
            Self::AccountAlreadyLinked { .. } => {
                "This social account is already linked to another user".to_string()
            }
            Self::IdentityProvider { .. } => "Social login failed".to_string(),
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "The server encountered an internal error".to_string()
            }
        }
    }
}

/// Categories of errors, following how each must be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or unsupported requests, always client-correctable.
    Protocol,
    /// Bad client credentials or an invalid code/token; deliberately uninformative.
    Authentication,
    /// Persistence or consistency failures; fatal for the request.
    Integrity,
    /// Failures talking to a social login provider.
    ExternalProvider,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol => write!(f, "protocol"),
            Self::Authentication => write!(f, "authentication"),
            Self::Integrity => write!(f, "integrity"),
            Self::ExternalProvider => write!(f, "external_provider"),
        }
    }
}
