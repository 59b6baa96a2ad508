//! Authorization code issuance and redemption.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::AuthResult;
use crate::storage::AuthorizationCodeStorage;
use crate::types::AuthorizationCode;

/// Issues and redeems single-use authorization codes.
#[derive(Clone)]
pub struct AuthorizationCodeStore {
    storage: Arc<dyn AuthorizationCodeStorage>,
    lifetime: Duration,
}

impl AuthorizationCodeStore {
    /// Creates a store issuing codes valid for `lifetime`.
    #[must_use]
    pub fn new(storage: Arc<dyn AuthorizationCodeStorage>, lifetime: Duration) -> Self {
        Self { storage, lifetime }
    }

    /// Generates and persists a new unused code. Returns the code value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the code cannot be persisted.
    pub async fn issue(
        &self,
        client_id: &str,
        user_id: Uuid,
        redirect_uri: &str,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> AuthResult<String> {
        let code = AuthorizationCode::new(client_id, user_id, redirect_uri, scopes, self.lifetime)
            .with_code_challenge(code_challenge, code_challenge_method);
        self.storage.create(&code).await?;

        tracing::debug!(client_id = %client_id, user_id = %user_id, "Authorization code issued");
        Ok(code.code)
    }

    /// Looks up a code without changing it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub async fn find(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        self.storage.find_by_code(code).await
    }

    /// Claims a code. Returns `true` only for the single winning caller.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn mark_used(&self, code: &str) -> AuthResult<bool> {
        self.storage.mark_used(code).await
    }

    /// Deletes expired codes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.storage.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAuthStorage;

    #[tokio::test]
    async fn test_issue_persists_unused_code() {
        let store = AuthorizationCodeStore::new(MemoryAuthStorage::shared(), Duration::minutes(10));
        let user_id = Uuid::new_v4();

        let code = store
            .issue(
                "c1",
                user_id,
                "https://app.example.com/cb",
                vec!["openid".to_string()],
                Some("challenge".to_string()),
                Some("S256".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(code.len(), 64);

        let stored = store.find(&code).await.unwrap().unwrap();
        assert!(!stored.used);
        assert_eq!(stored.user_id, user_id);
        assert_eq!(stored.code_challenge.as_deref(), Some("challenge"));

        assert!(store.mark_used(&code).await.unwrap());
        assert!(!store.mark_used(&code).await.unwrap());
    }
}
