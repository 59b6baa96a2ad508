//! JWT minting and verification.
//!
//! Access tokens and ID tokens are signed with HS256 using a single shared
//! secret. There is no key rotation and no public key material, so the
//! published JWKS is always empty.
//!
//! ## Example
//!
//! ```ignore
//! use idgate_auth::token::{SigningSecret, TokenCodec};
//!
//! let secret = SigningSecret::resolve(config.signing.secret.as_deref())?;
//! let codec = TokenCodec::new(&secret, "https://id.example.com");
//!
//! let token = codec.mint_access_token(&user_id.to_string(), "my-app", &scopes, Duration::hours(1))?;
//! let claims = codec.verify_access_token(&token)?;
//! ```

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::{ConfigError, MIN_SECRET_LENGTH};
use crate::crypto::random_hex;
use crate::types::scope::{EMAIL, PROFILE};
use crate::types::{User, has_scope, join_scopes};

/// Environment variable holding the HS256 signing secret.
pub const JWT_SECRET_ENV: &str = "IDGATE_JWT_SECRET";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while minting or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token is not a well-formed JWT.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token has expired.
    #[error("Token has expired")]
    Expired,

    /// A claim is missing or has the wrong value.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Encoding a token failed.
    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::InvalidClaims(err.to_string()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

impl From<TokenError> for crate::AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(message) => crate::AuthError::internal(message),
            other => crate::AuthError::invalid_token(other.to_string()),
        }
    }
}

// ============================================================================
// Signing Secret
// ============================================================================

/// The HS256 signing secret.
#[derive(Clone)]
pub struct SigningSecret {
    value: String,
    ephemeral: bool,
}

impl SigningSecret {
    /// Resolves the secret from `IDGATE_JWT_SECRET`, then `configured`,
    /// then a freshly generated random value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a supplied secret is shorter
    /// than [`MIN_SECRET_LENGTH`] bytes.
    pub fn resolve(configured: Option<&str>) -> Result<Self, ConfigError> {
        let from_env = std::env::var(JWT_SECRET_ENV).ok();
        Self::resolve_from(from_env.as_deref(), configured)
    }

    /// Resolution logic of [`SigningSecret::resolve`] with the environment
    /// value passed in.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a supplied secret is too short.
    pub fn resolve_from(from_env: Option<&str>, configured: Option<&str>) -> Result<Self, ConfigError> {
        let supplied = from_env
            .filter(|s| !s.is_empty())
            .map(|s| (s, JWT_SECRET_ENV))
            .or_else(|| configured.filter(|s| !s.is_empty()).map(|s| (s, "auth.signing.secret")));

        if let Some((value, source)) = supplied {
            if value.len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least {} bytes",
                    source, MIN_SECRET_LENGTH
                )));
            }
            tracing::debug!(source = source, "Using configured JWT signing secret");
            return Ok(Self {
                value: value.to_string(),
                ephemeral: false,
            });
        }

        tracing::warn!(
            "No JWT signing secret configured (set {}). Using an ephemeral secret: \
             tokens will not verify across restarts or other instances",
            JWT_SECRET_ENV
        );
        Ok(Self::ephemeral())
    }

    /// Generates a random 256-bit secret.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            value: random_hex(32),
            ephemeral: true,
        }
    }

    /// Wraps an explicit secret without validation.
    #[must_use]
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ephemeral: false,
        }
    }

    /// Returns `true` if the secret was generated at startup.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// The raw secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret")
            .field("value", &"<redacted>")
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject (user ID).
    pub sub: String,

    /// Audience (client ID).
    pub aud: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// JWT ID.
    pub jti: String,

    /// Space-separated scopes.
    pub scope: String,
}

impl AccessTokenClaims {
    /// Granted scopes, parsed.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        crate::types::parse_scopes(&self.scope)
    }
}

/// ID token claims for OpenID Connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject (user ID).
    pub sub: String,

    /// Audience (client ID).
    pub aud: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// When the user authenticated (Unix timestamp).
    pub auth_time: i64,

    /// Username, released with the `profile` scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email, released with the `email` scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Always `true` when `email` is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

// ============================================================================
// JWKS
// ============================================================================

/// JSON Web Key Set.
///
/// HS256 keys are never published, so the set is always empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<serde_json::Value>,
}

// ============================================================================
// Token Codec
// ============================================================================

/// Mints and verifies HS256 tokens.
///
/// Thread-safe and cheap to share behind an `Arc`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenCodec {
    /// Creates a codec for `issuer`.
    #[must_use]
    pub fn new(secret: &SigningSecret, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.expose().as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.expose().as_bytes()),
            issuer: issuer.into(),
        }
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Mints an access token for `subject`, audience `audience`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if encoding fails.
    pub fn mint_access_token(
        &self,
        subject: &str,
        audience: &str,
        scopes: &[String],
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: audience.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: join_scopes(scopes),
        };
        self.encode(&claims)
    }

    /// Mints an ID token for `user`, audience `audience`.
    ///
    /// `preferred_username` is included only with the `profile` scope;
    /// `email` and `email_verified` only with the `email` scope and only
    /// when the user has an email.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if encoding fails.
    pub fn mint_id_token(
        &self,
        user: &User,
        audience: &str,
        scopes: &[String],
        auth_time: OffsetDateTime,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let email = if has_scope(scopes, EMAIL) {
            user.email.clone()
        } else {
            None
        };
        let claims = IdTokenClaims {
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            aud: audience.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            auth_time: auth_time.unix_timestamp(),
            preferred_username: has_scope(scopes, PROFILE).then(|| user.username.clone()),
            email_verified: email.as_ref().map(|_| true),
            email,
        };
        self.encode(&claims)
    }

    /// Verifies signature, expiry and issuer of an access token.
    ///
    /// # Errors
    ///
    /// Returns the matching [`TokenError`] for any verification failure.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.decode(token)
    }

    /// Verifies an ID token. Used by tests and by relying parties sharing
    /// the secret.
    ///
    /// # Errors
    ///
    /// Returns the matching [`TokenError`] for any verification failure.
    pub fn verify_id_token(&self, token: &str) -> Result<IdTokenClaims, TokenError> {
        self.decode(token)
    }

    /// The published key set (always empty).
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks::default()
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.validate_aud = false; // Audience checked by the caller where relevant

        Ok(decode::<T>(token, &self.decoding_key, &validation)?.claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
