//! Link between a local user and an identity at a social login provider.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::crypto::SealedToken;

/// A social account linked to a local user.
///
/// `(provider, provider_user_id)` is globally unique. Provider tokens are kept
/// sealed; open them with [`crate::crypto::TokenCipher::open`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialAccount {
    /// Internal identifier.
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// Provider name (`google`, `github`).
    pub provider: String,

    /// The user's identifier at the provider.
    pub provider_user_id: String,

    /// Email reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Provider access token, sealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<SealedToken>,

    /// Provider refresh token, sealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<SealedToken>,

    /// When the provider access token expires, if the provider said.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,

    /// The profile document as returned by the provider.
    #[serde(default)]
    pub raw_profile: serde_json::Value,

    /// When the link was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the tokens or profile were last refreshed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SocialAccount {
    /// Creates a link with no tokens.
    #[must_use]
    pub fn new(user_id: Uuid, provider: impl Into<String>, provider_user_id: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider: provider.into(),
            provider_user_id: provider_user_id.into(),
            email: None,
            name: None,
            avatar_url: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            raw_profile: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the provider access token expired at or before `now`.
    ///
    /// Accounts without a known expiry are never considered expired.
    #[must_use]
    pub fn is_token_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_token_expiry() {
        let now = OffsetDateTime::now_utc();
        let mut account = SocialAccount::new(Uuid::new_v4(), "google", "123");
        assert!(!account.is_token_expired(now));

        account.expires_at = Some(now - Duration::seconds(1));
        assert!(account.is_token_expired(now));

        account.expires_at = Some(now + Duration::hours(1));
        assert!(!account.is_token_expired(now));
    }
}
