//! Authentication and authorization configuration.
//!
//! All sections deserialize with `#[serde(default)]` so a partial TOML file
//! (or none at all) yields a working single-instance setup.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! issuer = "https://id.example.com"
//!
//! [auth.oauth]
//! access_token_lifetime = "1h"
//! refresh_token_lifetime = "30d"
//!
//! [auth.social.google]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default issuer when none is configured.
pub const DEFAULT_ISSUER: &str = "http://localhost:8765";

/// Minimum accepted length of a configured HS256 signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Root authentication and authorization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL, used for the `iss` claim and as the base of discovery URLs.
    pub issuer: String,

    /// OAuth 2.0 lifetimes.
    pub oauth: OAuthConfig,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Browser session settings for the login and consent pages.
    pub session: SessionConfig,

    /// Social login providers.
    pub social: SocialConfig,

    /// Encryption of provider tokens at rest.
    pub encryption: EncryptionConfig,

    /// Interval of the background purge of expired codes and tokens.
    /// Disabled when unset.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub cleanup_interval: Option<Duration>,
}

impl AuthConfig {
    /// Returns the issuer with any trailing slash removed.
    #[must_use]
    pub fn issuer(&self) -> &str {
        let issuer = if self.issuer.is_empty() {
            DEFAULT_ISSUER
        } else {
            &self.issuer
        };
        issuer.trim_end_matches('/')
    }
}

/// OAuth 2.0 lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token and ID token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

impl OAuthConfig {
    /// Authorization code lifetime as a `time::Duration`.
    #[must_use]
    pub fn code_ttl(&self) -> time::Duration {
        to_time_duration(self.authorization_code_lifetime)
    }

    /// Access token lifetime as a `time::Duration`.
    #[must_use]
    pub fn access_token_ttl(&self) -> time::Duration {
        to_time_duration(self.access_token_lifetime)
    }

    /// Refresh token lifetime as a `time::Duration`.
    #[must_use]
    pub fn refresh_token_ttl(&self) -> time::Duration {
        to_time_duration(self.refresh_token_lifetime)
    }
}

/// Converts a configured duration, saturating on overflow.
pub(crate) fn to_time_duration(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}

/// Token signing configuration.
///
/// The HS256 secret is normally supplied through the `IDGATE_JWT_SECRET`
/// environment variable; this value is the fallback.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Fallback HS256 secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Session lifetime. Pending authorizations expire with the session.
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,

    /// Mark the cookie `Secure`. Enable whenever the issuer is served over HTTPS.
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "idgate_session".to_string(),
            lifetime: Duration::from_secs(3600),
            secure_cookies: false,
        }
    }
}

/// Social login providers. A provider is enabled when its section is present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Google OAuth client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<SocialProviderConfig>,

    /// GitHub OAuth app.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<SocialProviderConfig>,
}

/// OAuth client registration with a social provider.
#[derive(Clone, Deserialize, Serialize)]
pub struct SocialProviderConfig {
    /// OAuth client ID registered with the provider.
    pub client_id: String,

    /// OAuth client secret registered with the provider.
    pub client_secret: String,

    /// Scopes to request; provider defaults apply when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,

    /// Override for the provider's authorization endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// Override for the provider's token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// Override for the provider's profile endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_endpoint: Option<String>,
}

impl SocialProviderConfig {
    /// Creates a provider configuration with the given credentials.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: None,
            authorization_endpoint: None,
            token_endpoint: None,
            profile_endpoint: None,
        }
    }

    /// Sets the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<impl Into<String>>) -> Self {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the authorization, token, and profile endpoints.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        authorization: impl Into<String>,
        token: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        self.authorization_endpoint = Some(authorization.into());
        self.token_endpoint = Some(token.into());
        self.profile_endpoint = Some(profile.into());
        self
    }
}

impl std::fmt::Debug for SocialProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("profile_endpoint", &self.profile_endpoint)
            .finish()
    }
}

/// Encryption of provider tokens at rest.
///
/// The key is read from `IDGATE_TOKEN_KEY`, then from this section, and is
/// otherwise derived from the signing secret.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// 32-byte AES key, hex (64 chars) or base64 encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is not an absolute URL
    /// - Any lifetime is zero
    /// - A configured signing secret is shorter than [`MIN_SECRET_LENGTH`]
    /// - A social provider has an empty client ID or secret
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(self.issuer()).map_err(|e| {
            ConfigError::InvalidValue(format!("issuer must be an absolute URL: {}", e))
        })?;

        if self.oauth.authorization_code_lifetime.is_zero()
            || self.oauth.access_token_lifetime.is_zero()
            || self.oauth.refresh_token_lifetime.is_zero()
        {
            return Err(ConfigError::InvalidValue(
                "oauth lifetimes must be > 0".to_string(),
            ));
        }

        if let Some(secret) = &self.signing.secret
            && secret.len() < MIN_SECRET_LENGTH
        {
            return Err(ConfigError::InvalidValue(format!(
                "signing.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }

        if self.session.lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "session.lifetime must be > 0".to_string(),
            ));
        }

        for (name, provider) in [
            ("google", &self.social.google),
            ("github", &self.social.github),
        ] {
            if let Some(provider) = provider
                && (provider.client_id.is_empty() || provider.client_secret.is_empty())
            {
                return Err(ConfigError::Missing(format!(
                    "social.{}.client_id and social.{}.client_secret",
                    name, name
                )));
            }
        }

        Ok(())
    }
}
