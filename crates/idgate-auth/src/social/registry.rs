//! Configured social providers, by name.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::github::GitHubProvider;
use super::google::GoogleProvider;
use super::provider::{ProviderError, SocialProvider};
use crate::config::SocialConfig;
use crate::{AuthError, AuthResult};

/// The set of enabled social providers.
#[derive(Clone, Default)]
pub struct SocialProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SocialProvider>>,
}

impl SocialProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration. Providers without a
    /// configuration section are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider's HTTP client cannot be built.
    pub fn from_config(config: &SocialConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        if let Some(google) = &config.google {
            registry.register(Arc::new(GoogleProvider::new(google, timeout)?));
        }
        if let Some(github) = &config.github {
            registry.register(Arc::new(GitHubProvider::new(github, timeout)?));
        }
        Ok(registry)
    }

    /// Adds or replaces a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn SocialProvider>) {
        tracing::debug!(provider = %provider.name(), "Social provider registered");
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Looks up a provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if no provider has that name.
    pub fn get(&self, name: &str) -> AuthResult<Arc<dyn SocialProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::invalid_request(format!("Unsupported provider: {name}")))
    }

    /// Names of the enabled providers, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Returns `true` if no provider is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for SocialProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}
