//! End-user domain types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user in the authentication system.
///
/// Users created through social login have no password and can only sign in
/// through a linked provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier; the `sub` claim of every token issued for this user.
    pub id: Uuid,

    /// Unique login name.
    pub username: String,

    /// Email address, unique when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Argon2id hash of the password (None for social-only users).
    ///
    /// Never serialized.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,

    /// Whether the user account is active.
    ///
    /// Inactive users cannot authenticate.
    pub active: bool,

    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the user was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Creates an active user with no password and no email.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: None,
            password_hash: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the password hash.
    #[must_use]
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Returns `true` if the user can sign in with a password.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Input for creating a user from the admin CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Optional email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Plaintext password; hashed before storage.
    #[serde(default)]
    pub password: Option<String>,
}

impl NewUser {
    /// Validates the input.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty".to_string());
        }
        if let Some(email) = &self.email
            && !email.contains('@')
        {
            return Err(format!("invalid email address: {email}"));
        }
        if let Some(password) = &self.password
            && password.is_empty()
        {
            return Err("password cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("alice");
        assert!(user.active);
        assert!(!user.has_password());
        assert!(user.email.is_none());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("alice")
            .with_email("alice@example.com")
            .with_password_hash("$argon2id$hash");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn test_new_user_validation() {
        let input = NewUser {
            username: "bob".to_string(),
            email: Some("bob@example.com".to_string()),
            password: Some("pw".to_string()),
        };
        assert!(input.validate().is_ok());

        let input = NewUser {
            username: " ".to_string(),
            email: None,
            password: None,
        };
        assert!(input.validate().is_err());

        let input = NewUser {
            username: "bob".to_string(),
            email: Some("not-an-email".to_string()),
            password: None,
        };
        assert!(input.validate().is_err());
    }
}
