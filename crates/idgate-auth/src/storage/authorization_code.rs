//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - Codes are single-use; [`AuthorizationCodeStorage::mark_used`] is the
//!   only way to consume one and must be an atomic check-and-set
//! - Expired codes are removed periodically

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::AuthorizationCode;

/// Storage trait for authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a new authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Finds a code by its value.
    ///
    /// Returns codes regardless of expiration or use; callers check
    /// [`AuthorizationCode::is_valid`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Atomically claims a code.
    ///
    /// Flips `used` from `false` to `true` only if the code is currently
    /// unused and unexpired. Returns `true` if this call won the claim.
    /// Of any number of concurrent calls for the same code, at most one
    /// returns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, code: &str) -> AuthResult<bool>;

    /// Deletes expired codes. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn purge_expired(&self) -> AuthResult<u64>;
}
