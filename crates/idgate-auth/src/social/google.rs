//! Google sign-in.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::provider::{
    ProviderClient, ProviderDefaults, ProviderError, ProviderTokens, SocialProfile,
    SocialProvider, string_field,
};
use crate::config::SocialProviderConfig;

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth",
    token_endpoint: "https://oauth2.googleapis.com/token",
    profile_endpoint: "https://openidconnect.googleapis.com/v1/userinfo",
    scopes: &["openid", "email", "profile"],
};

/// Google OAuth 2.0 / OpenID Connect provider.
#[derive(Clone)]
pub struct GoogleProvider {
    client: ProviderClient,
}

impl GoogleProvider {
    /// Provider name.
    pub const NAME: &'static str = "google";

    /// Creates the provider from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SocialProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: ProviderClient::new(config, &DEFAULTS, timeout)?,
        })
    }
}

#[async_trait]
impl SocialProvider for GoogleProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError> {
        // offline access gets us a refresh token
        self.client
            .authorization_url(redirect_uri, state, &[("access_type", "offline")])
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, ProviderError> {
        self.client.exchange_code(code, redirect_uri).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<SocialProfile, ProviderError> {
        let raw = self.client.fetch_profile_json(access_token).await?;
        let id = string_field(&raw, "sub")
            .ok_or_else(|| ProviderError::Profile("profile has no sub".to_string()))?;

        Ok(SocialProfile {
            id,
            email: string_field(&raw, "email"),
            name: string_field(&raw, "name"),
            avatar_url: string_field(&raw, "picture"),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GoogleProvider {
        let config = SocialProviderConfig::new("google-client", "google-secret").with_endpoints(
            format!("{}/auth", server.uri()),
            format!("{}/token", server.uri()),
            format!("{}/userinfo", server.uri()),
        );
        GoogleProvider::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_authorization_url_uses_defaults() {
        let provider = GoogleProvider::new(
            &SocialProviderConfig::new("google-client", "google-secret"),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = provider
            .authorization_url("https://id.example.com/auth/google/callback", "abc")
            .unwrap();

        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("scope".into(), "openid email profile".into())));
        assert!(pairs.contains(&("state".into(), "abc".into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("client_id".into(), "google-client".into())));
    }

    #[tokio::test]
    async fn test_exchange_and_profile() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=google-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1234567890",
                "email": "jane@x.com",
                "name": "Jane Doe",
                "picture": "https://lh3.example.com/a.png"
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let tokens = provider
            .exchange_code("the-code", "http://localhost/cb")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "ya29.token");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.expires_in, Some(3599));

        let profile = provider.fetch_profile(&tokens.access_token).await.unwrap();
        assert_eq!(profile.id, "1234567890");
        assert_eq!(profile.email.as_deref(), Some("jane@x.com"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://lh3.example.com/a.png"));
        assert_eq!(profile.raw["name"], "Jane Doe");
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .exchange_code("bad", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TokenExchange(msg) if msg.starts_with("invalid_grant")));
    }

    #[tokio::test]
    async fn test_profile_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_profile("expired").await.unwrap_err();
        assert!(matches!(err, ProviderError::Profile(_)));
    }
}
