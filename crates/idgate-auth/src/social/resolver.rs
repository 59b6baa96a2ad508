//! Maps provider identities onto local users.
//!
//! # Flow
//!
//! 1. Exchange the code for provider tokens.
//! 2. Fetch the profile.
//! 3. Look up the `(provider, id)` link:
//!    - found: refresh the sealed tokens and return its owner
//!    - not found, signing in: create a user and a link in one storage call
//!    - not found, linking: create a link for the existing user
//!
//! Concurrent first logins for one identity race on that storage call. The
//! loser re-reads the link and signs in as its owner; a username conflict
//! with an unrelated user moves on to the next numeric suffix.
//!
//! Provider failures are logged in full and surfaced as
//! `AuthError::IdentityProvider`, whose public description is generic.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use url::Url;
use uuid::Uuid;

use super::provider::{ProviderTokens, SocialProfile};
use super::registry::SocialProviderRegistry;
use crate::crypto::TokenCipher;
use crate::storage::{SocialAccountStorage, UserStorage};
use crate::types::{SocialAccount, User};
use crate::{AuthError, AuthResult};

/// Fallback username when the profile has no usable email.
const DEFAULT_USERNAME: &str = "user";

/// Resolves social logins to local users.
#[derive(Clone)]
pub struct SocialIdentityResolver {
    providers: Arc<SocialProviderRegistry>,
    users: Arc<dyn UserStorage>,
    accounts: Arc<dyn SocialAccountStorage>,
    cipher: Arc<TokenCipher>,
}

impl SocialIdentityResolver {
    /// Creates a new resolver.
    #[must_use]
    pub fn new(
        providers: Arc<SocialProviderRegistry>,
        users: Arc<dyn UserStorage>,
        accounts: Arc<dyn SocialAccountStorage>,
        cipher: Arc<TokenCipher>,
    ) -> Self {
        Self {
            providers,
            users,
            accounts,
            cipher,
        }
    }

    /// The configured providers.
    #[must_use]
    pub fn providers(&self) -> &SocialProviderRegistry {
        &self.providers
    }

    /// Builds the provider's login URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an unknown provider, or
    /// `IdentityProvider` if the provider endpoint is misconfigured.
    pub fn authorization_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        state: &str,
    ) -> AuthResult<Url> {
        self.providers
            .get(provider)?
            .authorization_url(redirect_uri, state)
            .map_err(|e| {
                tracing::error!(provider = %provider, error = %e, "Cannot build provider authorization URL");
                AuthError::identity_provider(provider, e.to_string())
            })
    }

    /// Signs a user in with a provider, creating the user on first login.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an unknown provider
    /// - `IdentityProvider` if the provider call fails
    /// - storage errors
    pub async fn authenticate(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<User> {
        let (tokens, profile) = self.fetch_identity(provider, code, redirect_uri).await?;

        if let Some(owner) = self.linked_owner(provider, &profile, &tokens).await? {
            tracing::info!(provider = %provider, user_id = %owner.id, "Social login for linked account");
            return Ok(owner);
        }

        let base = base_username(profile.email.as_deref());
        let mut suffix = 0u32;
        loop {
            let candidate = if suffix == 0 {
                base.clone()
            } else {
                format!("{base}{suffix}")
            };
            if self.users.username_exists(&candidate).await? {
                suffix += 1;
                continue;
            }

            let mut user = User::new(candidate);
            user.email = profile.email.clone();
            let account = self.new_link(user.id, provider, &profile, &tokens)?;

            match self.accounts.create_with_user(&user, &account).await {
                Ok(()) => {
                    tracing::info!(
                        provider = %provider,
                        user_id = %user.id,
                        username = %user.username,
                        "User created from social login"
                    );
                    return Ok(user);
                }
                Err(e) => {
                    if let Some(owner) = self.linked_owner(provider, &profile, &tokens).await? {
                        tracing::debug!(
                            provider = %provider,
                            user_id = %owner.id,
                            "Concurrent first login already created the user"
                        );
                        return Ok(owner);
                    }
                    match e {
                        AuthError::UsernameTaken { .. } => suffix += 1,
                        other => return Err(other),
                    }
                }
            }
        }
    }

    /// Links a provider identity to an existing user.
    ///
    /// # Errors
    ///
    /// - `AccountAlreadyLinked` if the identity belongs to another user
    /// - `InvalidRequest` for an unknown provider or user
    /// - `IdentityProvider` if the provider call fails
    /// - storage errors
    pub async fn link_account(
        &self,
        provider: &str,
        code: &str,
        redirect_uri: &str,
        user_id: Uuid,
    ) -> AuthResult<User> {
        let (tokens, profile) = self.fetch_identity(provider, code, redirect_uri).await?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_request("User not found"))?;

        match self.accounts.find_by_provider(provider, &profile.id).await? {
            Some(account) if account.user_id != user_id => {
                tracing::warn!(
                    provider = %provider,
                    user_id = %user_id,
                    "Social account already linked to another user"
                );
                Err(AuthError::account_already_linked(provider))
            }
            Some(account) => {
                self.refresh_link(account, &profile, &tokens).await?;
                Ok(user)
            }
            None => {
                let account = self.new_link(user_id, provider, &profile, &tokens)?;
                self.accounts.create(&account).await?;
                tracing::info!(provider = %provider, user_id = %user_id, "Social account linked");
                Ok(user)
            }
        }
    }

    /// Owner of an existing link, after refreshing the link's tokens.
    async fn linked_owner(
        &self,
        provider: &str,
        profile: &SocialProfile,
        tokens: &ProviderTokens,
    ) -> AuthResult<Option<User>> {
        let Some(account) = self.accounts.find_by_provider(provider, &profile.id).await? else {
            return Ok(None);
        };
        let owner = self
            .users
            .find_by_id(account.user_id)
            .await?
            .ok_or_else(|| {
                AuthError::internal(format!(
                    "Social account {} references a missing user",
                    account.id
                ))
            })?;
        self.refresh_link(account, profile, tokens).await?;
        Ok(Some(owner))
    }

    async fn fetch_identity(
        &self,
        provider_name: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AuthResult<(ProviderTokens, SocialProfile)> {
        let provider = self.providers.get(provider_name)?;

        let tokens = provider
            .exchange_code(code, redirect_uri)
            .await
            .map_err(|e| {
                tracing::error!(provider = %provider_name, error = %e, "Provider code exchange failed");
                AuthError::identity_provider(provider_name, e.to_string())
            })?;

        let profile = provider
            .fetch_profile(&tokens.access_token)
            .await
            .map_err(|e| {
                tracing::error!(provider = %provider_name, error = %e, "Provider profile fetch failed");
                AuthError::identity_provider(provider_name, e.to_string())
            })?;

        Ok((tokens, profile))
    }

    fn new_link(
        &self,
        user_id: Uuid,
        provider: &str,
        profile: &SocialProfile,
        tokens: &ProviderTokens,
    ) -> AuthResult<SocialAccount> {
        let mut account = SocialAccount::new(user_id, provider, &profile.id);
        self.apply(&mut account, profile, tokens)?;
        Ok(account)
    }

    async fn refresh_link(
        &self,
        mut account: SocialAccount,
        profile: &SocialProfile,
        tokens: &ProviderTokens,
    ) -> AuthResult<()> {
        self.apply(&mut account, profile, tokens)?;
        account.updated_at = OffsetDateTime::now_utc();
        self.accounts.update(&account).await
    }

    fn apply(
        &self,
        account: &mut SocialAccount,
        profile: &SocialProfile,
        tokens: &ProviderTokens,
    ) -> AuthResult<()> {
        account.email = profile.email.clone();
        account.name = profile.name.clone();
        account.avatar_url = profile.avatar_url.clone();
        account.raw_profile = profile.raw.clone();
        account.access_token = Some(self.cipher.seal(&tokens.access_token)?);
        account.refresh_token = tokens
            .refresh_token
            .as_deref()
            .map(|t| self.cipher.seal(t))
            .transpose()?;
        account.expires_at = tokens
            .expires_in
            .map(|secs| OffsetDateTime::now_utc() + Duration::seconds(secs));
        Ok(())
    }
}

/// Username stem: the email local part restricted to `[A-Za-z0-9_]`.
fn base_username(email: Option<&str>) -> String {
    let stem: String = email
        .and_then(|e| e.split('@').next())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if stem.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        stem
    }
}
