//! Refresh token issuance, lookup and rotation.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::AuthResult;
use crate::storage::RefreshTokenStorage;
use crate::types::RefreshToken;

/// Issues, finds, revokes and rotates refresh tokens.
///
/// Callers only ever see plaintext token values; hashing happens here.
#[derive(Clone)]
pub struct RefreshTokenStore {
    storage: Arc<dyn RefreshTokenStorage>,
    lifetime: Duration,
}

impl RefreshTokenStore {
    /// Creates a store issuing tokens valid for `lifetime`.
    #[must_use]
    pub fn new(storage: Arc<dyn RefreshTokenStorage>, lifetime: Duration) -> Self {
        Self { storage, lifetime }
    }

    /// Generates and persists a new token. Returns the plaintext value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the token cannot be persisted.
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: Uuid,
        scopes: Vec<String>,
    ) -> AuthResult<String> {
        let (token, record) = RefreshToken::issue(client_id, user_id, scopes, self.lifetime);
        self.storage.create(&record).await?;
        Ok(token)
    }

    /// Looks up a token by its plaintext value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub async fn find_by_token(&self, token: &str) -> AuthResult<Option<RefreshToken>> {
        self.storage
            .find_by_hash(&RefreshToken::hash_token(token))
            .await
    }

    /// Revokes a token. Returns `true` if this call revoked it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn revoke(&self, token: &str) -> AuthResult<bool> {
        self.storage.revoke(&RefreshToken::hash_token(token)).await
    }

    /// Replaces `current` with a new token carrying the same client, user
    /// and scopes.
    ///
    /// Returns `Some(new_token)` on success, or `None` if `current` was
    /// revoked or expired in the meantime (including by a concurrent
    /// rotation).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rotation fails; nothing is written.
    pub async fn rotate(&self, current: &RefreshToken) -> AuthResult<Option<String>> {
        let (token, replacement) = RefreshToken::issue(
            &current.client_id,
            current.user_id,
            current.scopes.clone(),
            self.lifetime,
        );

        if self
            .storage
            .rotate(&current.token_hash, &replacement)
            .await?
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// Revokes every token of a user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn revoke_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        self.storage.revoke_by_user(user_id).await
    }

    /// Deletes expired tokens.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.storage.purge_expired().await
    }
}
