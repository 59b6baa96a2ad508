//! Social account storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{SocialAccount, User};

/// Storage operations for social accounts linked to local users.
#[async_trait]
pub trait SocialAccountStorage: Send + Sync {
    /// Finds the link for an identity at a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> AuthResult<Option<SocialAccount>>;

    /// Lists all links owned by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_user(&self, user_id: Uuid) -> AuthResult<Vec<SocialAccount>>;

    /// Stores a new link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountAlreadyLinked` if the provider identity is
    /// already linked, or a storage error.
    async fn create(&self, account: &SocialAccount) -> AuthResult<()>;

    /// Stores a new user together with its first link, or neither.
    ///
    /// # Errors
    ///
    /// - `AuthError::UsernameTaken` if the username is taken
    /// - `AuthError::InvalidRequest` if the email is already registered
    /// - `AuthError::AccountAlreadyLinked` if the provider identity is
    ///   already linked
    /// - storage errors
    async fn create_with_user(&self, user: &User, account: &SocialAccount) -> AuthResult<()>;

    /// Replaces the profile fields and sealed tokens of an existing link.
    ///
    /// # Errors
    ///
    /// Returns an error if the link does not exist or the operation fails.
    async fn update(&self, account: &SocialAccount) -> AuthResult<()>;
}
