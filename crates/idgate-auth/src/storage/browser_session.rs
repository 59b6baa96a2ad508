//! Browser session storage trait.
//!
//! Sessions back the login and consent pages: they remember the
//! authenticated user, a pending authorization request and the social login
//! CSRF state between redirects.
//!
//! # Implementation Notes
//!
//! - Lookups must not return expired sessions
//! - Expired sessions should be cleaned up periodically

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::session::BrowserSession;

/// Storage trait for browser sessions.
#[async_trait]
pub trait BrowserSessionStorage: Send + Sync {
    /// Inserts or replaces a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    async fn save(&self, session: &BrowserSession) -> AuthResult<()>;

    /// Finds a session by its ID.
    ///
    /// Returns `None` if the session is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, id: &str) -> AuthResult<Option<BrowserSession>>;

    /// Deletes a session. Deleting a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: &str) -> AuthResult<()>;

    /// Deletes expired sessions. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn purge_expired(&self) -> AuthResult<u64>;
}
