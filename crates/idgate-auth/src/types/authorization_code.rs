//! Authorization code domain type.
//!
//! # Lifecycle
//!
//! 1. Created when the user approves the consent prompt
//! 2. Exchanged exactly once at the token endpoint (marked used)
//! 3. Removed by the periodic expiry purge
//!
//! # Security
//!
//! - Codes are 256-bit random values, hex encoded (64 characters)
//! - Codes are bound to the client and the exact redirect URI they were issued for
//! - PKCE challenge fields are persisted but not verified at exchange

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::crypto::generate_token;

/// A one-time authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCode {
    /// The opaque code value.
    pub code: String,

    /// Public identifier of the client the code was issued to.
    pub client_id: String,

    /// The user who approved the request.
    pub user_id: Uuid,

    /// The exact redirect URI used at issuance.
    pub redirect_uri: String,

    /// Granted scope names.
    pub scopes: Vec<String>,

    /// PKCE code challenge, if the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method, if the client sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Whether the code has been exchanged.
    pub used: bool,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being exchangeable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Creates a fresh, unused code valid for `ttl`.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        user_id: Uuid,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            code: generate_token(),
            client_id: client_id.into(),
            user_id,
            redirect_uri: redirect_uri.into(),
            scopes,
            code_challenge: None,
            code_challenge_method: None,
            used: false,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Attaches the PKCE challenge from the authorization request.
    #[must_use]
    pub fn with_code_challenge(
        mut self,
        challenge: Option<String>,
        method: Option<String>,
    ) -> Self {
        self.code_challenge = challenge;
        self.code_challenge_method = method;
        self
    }

    /// Returns `true` if the code expired at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if this code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// Returns `true` if the code is unused and unexpired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.used && !self.is_expired()
    }
}
