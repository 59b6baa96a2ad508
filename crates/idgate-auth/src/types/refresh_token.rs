//! Refresh token domain type.
//!
//! # Security
//!
//! - Refresh tokens are stored as SHA-256 hashes, never plaintext
//! - Each successful refresh revokes the presented token and issues a successor
//! - Expired tokens are cleaned up periodically

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::crypto::{generate_token, sha256_hex};

/// Refresh token stored in the database.
///
/// The plaintext token is returned to the client once; lookups hash the
/// presented value and search by hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Unique identifier for this refresh token record.
    pub id: Uuid,

    /// SHA-256 hash of the actual token value.
    pub token_hash: String,

    /// Public identifier of the client the token was issued to.
    pub client_id: String,

    /// The user the token acts for.
    pub user_id: Uuid,

    /// Granted scope names.
    pub scopes: Vec<String>,

    /// Whether the token has been revoked (rotation or explicit revocation).
    pub revoked: bool,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshToken {
    /// Generates a new token value and the record that stores its hash.
    ///
    /// Returns `(plaintext, record)`.
    #[must_use]
    pub fn issue(
        client_id: impl Into<String>,
        user_id: Uuid,
        scopes: Vec<String>,
        ttl: Duration,
    ) -> (String, Self) {
        let token = generate_token();
        let now = OffsetDateTime::now_utc();
        let record = Self {
            id: Uuid::new_v4(),
            token_hash: Self::hash_token(&token),
            client_id: client_id.into(),
            user_id,
            scopes,
            revoked: false,
            created_at: now,
            expires_at: now + ttl,
        };
        (token, record)
    }

    /// Returns `true` if the token expired at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Returns `true` if this token is not revoked and not expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }

    /// Hash a token value using SHA-256.
    ///
    /// Used both when storing new tokens and when looking tokens up.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        sha256_hex(token)
    }
}
