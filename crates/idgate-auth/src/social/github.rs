//! GitHub sign-in.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::provider::{
    ProviderClient, ProviderDefaults, ProviderError, ProviderTokens, SocialProfile,
    SocialProvider, string_field,
};
use crate::config::SocialProviderConfig;

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    authorization_endpoint: "https://github.com/login/oauth/authorize",
    token_endpoint: "https://github.com/login/oauth/access_token",
    profile_endpoint: "https://api.github.com/user",
    scopes: &["user:email"],
};

/// GitHub OAuth app provider.
#[derive(Clone)]
pub struct GitHubProvider {
    client: ProviderClient,
}

impl GitHubProvider {
    /// Provider name.
    pub const NAME: &'static str = "github";

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
impl SocialProvider for GitHubProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError> {
        self.client.authorization_url(redirect_uri, state, &[])
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

        // GitHub ids are numbers
        let id = match raw.get("id") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ProviderError::Profile("profile has no id".to_string())),
        };

        Ok(SocialProfile {
            id,
            email: string_field(&raw, "email"),
            name: string_field(&raw, "name").or_else(|| string_field(&raw, "login")),
            avatar_url: string_field(&raw, "avatar_url"),
            raw,
        })
    }
}
