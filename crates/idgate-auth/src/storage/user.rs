//! User storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::User;

/// Storage operations for end users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Find a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Find a user by username (exact match).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Returns `true` if the username is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UsernameTaken` if the username is taken,
    /// `AuthError::InvalidRequest` if the email is already registered, or a
    /// storage error.
    async fn create(&self, user: &User) -> AuthResult<()>;

    /// Activate or deactivate a user.
    ///
    /// Returns `false` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn set_active(&self, id: Uuid, active: bool) -> AuthResult<bool>;
}
