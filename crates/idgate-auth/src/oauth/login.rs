//! Username and password sign-in.

use std::sync::Arc;

use crate::crypto::verify_secret;
use crate::storage::UserStorage;
use crate::types::User;
use crate::{AuthError, AuthResult};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Verifies end-user passwords.
#[derive(Clone)]
pub struct PasswordAuthenticator {
    users: Arc<dyn UserStorage>,
}

impl PasswordAuthenticator {
    /// Creates a new authenticator.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self { users }
    }

    /// Authenticates a user by username and password.
    ///
    /// Unknown users, social-only users and wrong passwords all fail with the
    /// same message. The disabled state is only revealed after the password
    /// matched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` on failure, or a storage error.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        let Some(user) = self.users.find_by_username(username.trim()).await? else {
            tracing::debug!(username = %username, "Login failed: unknown user");
            return Err(AuthError::unauthorized(INVALID_CREDENTIALS));
        };

        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "Login failed: user has no password");
            return Err(AuthError::unauthorized(INVALID_CREDENTIALS));
        };

        match verify_secret(password, hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(user_id = %user.id, "Login failed: wrong password");
                return Err(AuthError::unauthorized(INVALID_CREDENTIALS));
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
                return Err(AuthError::unauthorized(INVALID_CREDENTIALS));
            }
        }

        if !user.active {
            tracing::info!(user_id = %user.id, "Login refused: account disabled");
            return Err(AuthError::unauthorized("Account is disabled"));
        }

        tracing::info!(user_id = %user.id, "User signed in with password");
        Ok(user)
    }
}
