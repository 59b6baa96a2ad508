//! Browser session state for the login and consent pages.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::crypto::random_hex;
use crate::oauth::authorize::PendingAuthorization;

/// Server-side state tied to a browser by an opaque cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSession {
    /// Opaque session identifier (cookie value).
    pub id: String,

    /// The signed-in user, if any.
    pub user_id: Option<Uuid>,

    /// Authorization request suspended while the user signs in.
    pub pending_authorization: Option<PendingAuthorization>,

    /// CSRF state sent to a social provider.
    pub social_state: Option<String>,

    /// Where to send the user after a social login completes.
    pub oauth_redirect_uri: Option<String>,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl BrowserSession {
    /// Creates an anonymous session valid for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: random_hex(32),
            user_id: None,
            pending_authorization: None,
            social_state: None,
            oauth_redirect_uri: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` if a user has signed in on this session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Marks the session as signed in.
    ///
    /// Any social login state is cleared; a pending authorization is kept so
    /// it can be replayed.
    pub fn sign_in(&mut self, user_id: Uuid) {
        self.user_id = Some(user_id);
        self.social_state = None;
    }

    /// Removes and returns the pending authorization.
    pub fn take_pending_authorization(&mut self) -> Option<PendingAuthorization> {
        self.pending_authorization.take()
    }
}
