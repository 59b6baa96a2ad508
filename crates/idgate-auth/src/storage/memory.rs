//! In-memory storage backend.
//!
//! Every map sits behind its own `tokio::sync::RwLock`. The atomic
//! operations (`mark_used`, `rotate`) do their check and their write under a
//! single write guard.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuthorizationCodeStorage, BrowserSessionStorage, ClientStorage, RefreshTokenStorage,
    SocialAccountStorage, UserStorage,
};
use crate::oauth::session::BrowserSession;
use crate::types::{AuthorizationCode, Client, RefreshToken, SocialAccount, User};
use crate::{AuthError, AuthResult};

/// In-memory implementation of every auth storage trait.
#[derive(Debug, Default)]
pub struct MemoryAuthStorage {
    clients: RwLock<HashMap<String, Client>>,
    users: RwLock<HashMap<Uuid, User>>,
    codes: RwLock<HashMap<String, AuthorizationCode>>,
    refresh_tokens: RwLock<HashMap<String, RefreshToken>>,
    social_accounts: RwLock<HashMap<Uuid, SocialAccount>>,
    sessions: RwLock<HashMap<String, BrowserSession>>,
}

impl MemoryAuthStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

// =============================================================================
// Clients
// =============================================================================

#[async_trait]
impl ClientStorage for MemoryAuthStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<()> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::invalid_request(format!(
                "Client '{}' already exists",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<Client>> {
        let clients = self.clients.read().await;
        let mut all: Vec<Client> = clients.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserStorage for MemoryAuthStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<()> {
        let mut users = self.users.write().await;
        check_new_user(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AuthResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.active = active;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Authorization codes
// =============================================================================

#[async_trait]
impl AuthorizationCodeStorage for MemoryAuthStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        let mut codes = self.codes.write().await;
        if codes.contains_key(&code.code) {
            return Err(AuthError::storage("Duplicate authorization code"));
        }
        codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self.codes.read().await.get(code).cloned())
    }

    async fn mark_used(&self, code: &str) -> AuthResult<bool> {
        let mut codes = self.codes.write().await;
        match codes.get_mut(code) {
            Some(entry) if entry.is_valid() => {
                entry.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired());
        Ok((before - codes.len()) as u64)
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

#[async_trait]
impl RefreshTokenStorage for MemoryAuthStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.contains_key(&token.token_hash) {
            return Err(AuthError::storage("Duplicate refresh token"));
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.read().await.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let mut tokens = self.refresh_tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool> {
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.contains_key(&replacement.token_hash) {
            return Err(AuthError::storage("Duplicate refresh token"));
        }
        match tokens.get_mut(old_hash) {
            Some(old) if old.is_valid() => old.revoked = true,
            _ => return Ok(false),
        }
        tokens.insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let mut tokens = self.refresh_tokens.write().await;
        let mut count = 0u64;
        for token in tokens.values_mut() {
            if token.user_id == user_id && !token.revoked {
                token.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let mut tokens = self.refresh_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok((before - tokens.len()) as u64)
    }
}

// =============================================================================
// Social accounts
// =============================================================================

#[async_trait]
impl SocialAccountStorage for MemoryAuthStorage {
    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> AuthResult<Option<SocialAccount>> {
        Ok(self
            .social_accounts
            .read()
            .await
            .values()
            .find(|a| a.provider == provider && a.provider_user_id == provider_user_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> AuthResult<Vec<SocialAccount>> {
        let accounts = self.social_accounts.read().await;
        let mut owned: Vec<SocialAccount> = accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|a| a.created_at);
        Ok(owned)
    }

    async fn create(&self, account: &SocialAccount) -> AuthResult<()> {
        let mut accounts = self.social_accounts.write().await;
        check_new_link(&accounts, account)?;
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn create_with_user(&self, user: &User, account: &SocialAccount) -> AuthResult<()> {
        // Lock order: users, then social accounts.
        let mut users = self.users.write().await;
        let mut accounts = self.social_accounts.write().await;
        check_new_user(&users, user)?;
        check_new_link(&accounts, account)?;
        users.insert(user.id, user.clone());
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update(&self, account: &SocialAccount) -> AuthResult<()> {
        let mut accounts = self.social_accounts.write().await;
        match accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(AuthError::storage(format!(
                "Social account {} not found",
                account.id
            ))),
        }
    }
}

fn check_new_user(users: &HashMap<Uuid, User>, user: &User) -> AuthResult<()> {
    if users.values().any(|u| u.username == user.username) {
        return Err(AuthError::username_taken(&user.username));
    }
    if let Some(email) = &user.email
        && users.values().any(|u| u.email.as_ref() == Some(email))
    {
        return Err(AuthError::invalid_request("Email already registered"));
    }
    Ok(())
}

fn check_new_link(
    accounts: &HashMap<Uuid, SocialAccount>,
    account: &SocialAccount,
) -> AuthResult<()> {
    if accounts
        .values()
        .any(|a| a.provider == account.provider && a.provider_user_id == account.provider_user_id)
    {
        return Err(AuthError::account_already_linked(&account.provider));
    }
    Ok(())
}

// =============================================================================
// Browser sessions
// =============================================================================

#[async_trait]
impl BrowserSessionStorage for MemoryAuthStorage {
    async fn save(&self, session: &BrowserSession) -> AuthResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> AuthResult<Option<BrowserSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn delete(&self, id: &str) -> AuthResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn code(ttl: Duration) -> AuthorizationCode {
        AuthorizationCode::new(
            "c1",
            Uuid::new_v4(),
            "https://app.example.com/cb",
            vec!["openid".to_string()],
            ttl,
        )
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let storage = MemoryAuthStorage::new();
        let code = code(Duration::minutes(10));
        AuthorizationCodeStorage::create(&storage, &code).await.unwrap();

        assert!(storage.mark_used(&code.code).await.unwrap());
        assert!(!storage.mark_used(&code.code).await.unwrap());

        let stored = storage.find_by_code(&code.code).await.unwrap().unwrap();
        assert!(stored.used);
    }

    #[tokio::test]
    async fn test_mark_used_rejects_expired_and_unknown() {
        let storage = MemoryAuthStorage::new();
        let expired = code(Duration::seconds(-5));
        AuthorizationCodeStorage::create(&storage, &expired).await.unwrap();

        assert!(!storage.mark_used(&expired.code).await.unwrap());
        assert!(!storage.mark_used("missing").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mark_used_single_winner() {
        let storage = MemoryAuthStorage::shared();
        let code = code(Duration::minutes(10));
        AuthorizationCodeStorage::create(storage.as_ref(), &code)
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                let value = code.code.clone();
                tokio::spawn(async move { storage.mark_used(&value).await.unwrap() })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_codes() {
        let storage = MemoryAuthStorage::new();
        AuthorizationCodeStorage::create(&storage, &code(Duration::seconds(-1)))
            .await
            .unwrap();
        AuthorizationCodeStorage::create(&storage, &code(Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(AuthorizationCodeStorage::purge_expired(&storage).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rotate_revokes_old_and_inserts_new() {
        let storage = MemoryAuthStorage::new();
        let user_id = Uuid::new_v4();
        let (_, old) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
        RefreshTokenStorage::create(&storage, &old).await.unwrap();

        let (_, new) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
        assert!(storage.rotate(&old.token_hash, &new).await.unwrap());

        let old_stored = storage.find_by_hash(&old.token_hash).await.unwrap().unwrap();
        assert!(old_stored.revoked);
        assert!(storage.find_by_hash(&new.token_hash).await.unwrap().is_some());

        let (_, third) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
        assert!(!storage.rotate(&old.token_hash, &third).await.unwrap());
        assert!(storage.find_by_hash(&third.token_hash).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotate_single_winner() {
        let storage = MemoryAuthStorage::shared();
        let user_id = Uuid::new_v4();
        let (_, old) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
        RefreshTokenStorage::create(storage.as_ref(), &old).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                let old_hash = old.token_hash.clone();
                tokio::spawn(async move {
                    let (_, new) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
                    storage.rotate(&old_hash, &new).await.unwrap()
                })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_revoke_reports_transition() {
        let storage = MemoryAuthStorage::new();
        let (_, token) = RefreshToken::issue("c1", Uuid::new_v4(), vec![], Duration::days(1));
        RefreshTokenStorage::create(&storage, &token).await.unwrap();

        assert!(storage.revoke(&token.token_hash).await.unwrap());
        assert!(!storage.revoke(&token.token_hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_by_user() {
        let storage = MemoryAuthStorage::new();
        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            let (_, token) = RefreshToken::issue("c1", user_id, vec![], Duration::days(1));
            RefreshTokenStorage::create(&storage, &token).await.unwrap();
        }
        let (_, other) = RefreshToken::issue("c1", Uuid::new_v4(), vec![], Duration::days(1));
        RefreshTokenStorage::create(&storage, &other).await.unwrap();

        assert_eq!(storage.revoke_by_user(user_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let storage = MemoryAuthStorage::new();
        UserStorage::create(&storage, &User::new("jane")).await.unwrap();
        let err = UserStorage::create(&storage, &User::new("jane"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken { .. }));
        assert!(storage.username_exists("jane").await.unwrap());
        assert!(!storage.username_exists("jane1").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_with_user_is_all_or_nothing() {
        let storage = MemoryAuthStorage::new();
        let jane = User::new("jane");
        let link = SocialAccount::new(jane.id, "google", "g-1");
        storage.create_with_user(&jane, &link).await.unwrap();
        assert_eq!(storage.find_by_user(jane.id).await.unwrap().len(), 1);

        // Same identity, fresh username: the link conflict leaves no user behind.
        let other = User::new("jane1");
        let err = storage
            .create_with_user(&other, &SocialAccount::new(other.id, "google", "g-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountAlreadyLinked { .. }));
        assert!(storage.find_by_id(other.id).await.unwrap().is_none());

        // Taken username: the link is not stored either.
        let dup = User::new("jane");
        let err = storage
            .create_with_user(&dup, &SocialAccount::new(dup.id, "github", "gh-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken { .. }));
        assert!(storage.find_by_provider("github", "gh-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_social_account_uniqueness() {
        let storage = MemoryAuthStorage::new();
        let account = SocialAccount::new(Uuid::new_v4(), "google", "g-1");
        SocialAccountStorage::create(&storage, &account).await.unwrap();

        let duplicate = SocialAccount::new(Uuid::new_v4(), "google", "g-1");
        let err = SocialAccountStorage::create(&storage, &duplicate)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountAlreadyLinked { .. }));

        let same_id_other_provider = SocialAccount::new(Uuid::new_v4(), "github", "g-1");
        assert!(
            SocialAccountStorage::create(&storage, &same_id_other_provider)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_expired_session_not_found() {
        let storage = MemoryAuthStorage::new();
        let session = BrowserSession::new(Duration::seconds(-1));
        storage.save(&session).await.unwrap();

        assert!(storage.find(&session.id).await.unwrap().is_none());
        assert_eq!(BrowserSessionStorage::purge_expired(&storage).await.unwrap(), 1);
    }
}
