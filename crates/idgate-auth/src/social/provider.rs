//! The provider capability interface and its shared wire plumbing.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::SocialProviderConfig;

/// Default timeout for calls to a provider.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from talking to a social login provider.
///
/// These never reach an end user; the resolver logs them and surfaces a
/// generic failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or unreadable response body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured endpoint is not a valid URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The token endpoint rejected the code.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The profile endpoint failed or returned an unusable profile.
    #[error("Profile request failed: {0}")]
    Profile(String),
}

/// Tokens granted by a provider for a code.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    /// Provider access token.
    pub access_token: String,
    /// Provider refresh token, if one was issued.
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, if the provider said.
    pub expires_in: Option<i64>,
}

impl std::fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// A user profile normalized across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialProfile {
    /// The user's identifier at the provider, as a string.
    pub id: String,
    /// Email address, if shared.
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// The profile document as returned.
    pub raw: serde_json::Value,
}

/// A social login provider.
#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// Provider name used in routes and stored on social accounts.
    fn name(&self) -> &str;

    /// Builds the URL that starts a login at the provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::InvalidEndpoint` if the configured
    /// authorization endpoint is not a valid URL.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError>;

    /// Exchanges an authorization code for provider tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects the code.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, ProviderError>;

    /// Fetches the user's profile with a provider access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the profile has no id.
    async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, ProviderError>;
}

// =============================================================================
// Shared plumbing
// =============================================================================

/// Endpoints and credentials of one provider registration.
#[derive(Clone)]
pub(crate) struct ProviderClient {
    pub(crate) http: reqwest::Client,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) authorization_endpoint: String,
    pub(crate) token_endpoint: String,
    pub(crate) profile_endpoint: String,
}

/// Built-in endpoints and scopes of a provider.
pub(crate) struct ProviderDefaults {
    pub(crate) authorization_endpoint: &'static str,
    pub(crate) token_endpoint: &'static str,
    pub(crate) profile_endpoint: &'static str,
    pub(crate) scopes: &'static [&'static str],
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ProviderClient {
    pub(crate) fn new(
        config: &SocialProviderConfig,
        defaults: &ProviderDefaults,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("idgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let scopes = config.scopes.clone().unwrap_or_else(|| {
            defaults
                .scopes
                .iter()
                .map(|s| (*s).to_string())
                .collect()
        });

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes,
            authorization_endpoint: config
                .authorization_endpoint
                .clone()
                .unwrap_or_else(|| defaults.authorization_endpoint.to_string()),
            token_endpoint: config
                .token_endpoint
                .clone()
                .unwrap_or_else(|| defaults.token_endpoint.to_string()),
            profile_endpoint: config
                .profile_endpoint
                .clone()
                .unwrap_or_else(|| defaults.profile_endpoint.to_string()),
        })
    }

    /// Authorization URL with the standard code-flow parameters plus `extra`.
    pub(crate) fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        extra: &[(&str, &str)],
    ) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Posts the code to the token endpoint.
    ///
    /// Some providers answer errors with `200 OK` and an `error` field, so
    /// the body is checked regardless of status.
    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenEndpointResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::TokenExchange(format!("HTTP {status}: unreadable response ({e})"))
        })?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::TokenExchange(match parsed.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            }));
        }
        if !status.is_success() {
            return Err(ProviderError::TokenExchange(format!("HTTP {status}")));
        }

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::TokenExchange("response has no access_token".into()))?;

        Ok(ProviderTokens {
            access_token,
            refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
            expires_in: parsed.expires_in,
        })
    }

    /// Fetches the profile document with a bearer token.
    pub(crate) async fn fetch_profile_json(
        &self,
        access_token: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http
            .get(&self.profile_endpoint)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Profile(format!("HTTP {}", response.status())));
        }

        Ok(response.json().await?)
    }
}

/// Reads an optional non-empty string field from a profile document.
pub(crate) fn string_field(raw: &serde_json::Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
