//! Storage traits for authentication and authorization data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Users and their linked social accounts
//! - Authorization codes and refresh tokens
//! - Browser sessions for the login and consent pages
//!
//! # Implementations
//!
//! - [`memory`] - in-process maps, for tests and single-instance setups
//! - `idgate-auth-postgres` - PostgreSQL storage backend

use std::sync::Arc;

use crate::AuthResult;

pub mod authorization_code;
pub mod browser_session;
pub mod client;
pub mod memory;
pub mod refresh_token;
pub mod social_account;
pub mod user;

pub use authorization_code::AuthorizationCodeStorage;
pub use browser_session::BrowserSessionStorage;
pub use client::ClientStorage;
pub use memory::MemoryAuthStorage;
pub use refresh_token::RefreshTokenStorage;
pub use social_account::SocialAccountStorage;
pub use user::UserStorage;

/// Handles to every storage the engine needs.
///
/// A single backend usually implements all traits; [`AuthStorage::from_backend`]
/// hands out one `Arc` per trait.
#[derive(Clone)]
pub struct AuthStorage {
    /// OAuth clients.
    pub clients: Arc<dyn ClientStorage>,
    /// Users.
    pub users: Arc<dyn UserStorage>,
    /// Authorization codes.
    pub codes: Arc<dyn AuthorizationCodeStorage>,
    /// Refresh tokens.
    pub refresh_tokens: Arc<dyn RefreshTokenStorage>,
    /// Linked social accounts.
    pub social_accounts: Arc<dyn SocialAccountStorage>,
    /// Browser sessions.
    pub sessions: Arc<dyn BrowserSessionStorage>,
}

/// Number of records removed by [`AuthStorage::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired authorization codes.
    pub codes: u64,
    /// Expired or revoked refresh tokens.
    pub refresh_tokens: u64,
    /// Expired browser sessions.
    pub sessions: u64,
}

impl PurgeReport {
    /// Total records removed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.codes + self.refresh_tokens + self.sessions
    }
}

impl AuthStorage {
    /// Uses one backend for every storage trait.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ClientStorage
            + UserStorage
            + AuthorizationCodeStorage
            + RefreshTokenStorage
            + SocialAccountStorage
            + BrowserSessionStorage
            + 'static,
    {
        Self {
            clients: backend.clone(),
            users: backend.clone(),
            codes: backend.clone(),
            refresh_tokens: backend.clone(),
            social_accounts: backend.clone(),
            sessions: backend,
        }
    }

    /// In-memory storage for tests and single-instance setups.
    #[must_use]
    pub fn memory() -> Self {
        Self::from_backend(MemoryAuthStorage::shared())
    }

    /// Deletes expired codes, refresh tokens and sessions.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn purge_expired(&self) -> AuthResult<PurgeReport> {
        let report = PurgeReport {
            codes: self.codes.purge_expired().await?,
            refresh_tokens: self.refresh_tokens.purge_expired().await?,
            sessions: self.sessions.purge_expired().await?,
        };
        if report.total() > 0 {
            tracing::info!(
                codes = report.codes,
                refresh_tokens = report.refresh_tokens,
                sessions = report.sessions,
                "Purged expired records"
            );
        }
        Ok(report)
    }
}
