//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Revocation and rotation must be atomic
//! - Expired tokens should be cleaned up periodically

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::RefreshToken;

/// Storage trait for refresh tokens.
///
/// All lookups are by `token_hash`; see [`RefreshToken::hash_token`].
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored (duplicate hash,
    /// storage unavailable).
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Finds a refresh token by its hash.
    ///
    /// Returns tokens regardless of expiration/revocation status;
    /// callers should check `is_valid()` before using.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Revokes a refresh token.
    ///
    /// Returns `true` only if this call moved the token from not revoked to
    /// revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;

    /// Atomically revokes `old_hash` and stores `replacement`.
    ///
    /// Nothing is written and `false` is returned if the old token is
    /// missing, already revoked, or expired. Of any number of concurrent
    /// rotations of the same token, at most one returns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; in that case neither
    /// write has taken effect.
    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool>;

    /// Revokes all refresh tokens for a user. Returns the number revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke_by_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Deletes expired tokens. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn purge_expired(&self) -> AuthResult<u64>;
}
