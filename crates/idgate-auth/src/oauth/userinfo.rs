//! OpenID Connect UserInfo.
//!
//! The claims returned depend on the scopes granted in the access token:
//!
//! - `profile`: `preferred_username`
//! - `email`: `email` and `email_verified` (only if the user has an email)
//!
//! `sub` is always present.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::UserStorage;
use crate::token::jwt::TokenCodec;
use crate::types::{has_scope, scope::EMAIL, scope::PROFILE};
use crate::{AuthError, AuthResult};

/// UserInfo response per OpenID Connect Core 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfoResponse {
    /// Subject identifier.
    pub sub: String,

    /// Username. Only with the `profile` scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Email address. Only with the `email` scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Always `true` when `email` is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// Extracts a bearer token from an `Authorization` header value or, failing
/// that, from the `access_token` query parameter.
///
/// The `Bearer` scheme is matched case-insensitively.
#[must_use]
pub fn extract_bearer<'a>(
    authorization: Option<&'a str>,
    access_token_param: Option<&'a str>,
) -> Option<&'a str> {
    let from_header = authorization.and_then(|value| {
        let (scheme, token) = value.trim().split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|t| !t.is_empty())
    });

    from_header.or_else(|| access_token_param.map(str::trim).filter(|t| !t.is_empty()))
}

/// Resolves access tokens to UserInfo claims.
#[derive(Clone)]
pub struct UserInfoService {
    users: Arc<dyn UserStorage>,
    codec: Arc<TokenCodec>,
}

impl UserInfoService {
    /// Creates a new service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>, codec: Arc<TokenCodec>) -> Self {
        Self { users, codec }
    }

    /// Returns the claims for the user an access token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is missing, fails
    /// verification, or names an unknown or inactive user.
    pub async fn userinfo(&self, bearer: Option<&str>) -> AuthResult<UserInfoResponse> {
        let token =
            bearer.ok_or_else(|| AuthError::invalid_token("Missing or invalid Authorization header"))?;

        let claims = self.codec.verify_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "UserInfo rejected access token");
            AuthError::invalid_token("Invalid or expired access token")
        })?;

        let user_id = claims
            .sub
            .parse()
            .map_err(|_| AuthError::invalid_token("User not found"))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| AuthError::invalid_token("User not found"))?;

        let scopes = claims.scopes();
        let email = if has_scope(&scopes, EMAIL) {
            user.email.clone()
        } else {
            None
        };

        Ok(UserInfoResponse {
            sub: user.id.to_string(),
            preferred_username: has_scope(&scopes, PROFILE).then(|| user.username.clone()),
            email_verified: email.as_ref().map(|_| true),
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAuthStorage;
    use crate::token::jwt::SigningSecret;
    use crate::types::{User, parse_scopes};
    use time::Duration;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            &SigningSecret::from_value("0123456789abcdef0123456789abcdef"),
            "http://localhost:8765",
        ))
    }

    async fn setup(user: &User) -> (UserInfoService, Arc<TokenCodec>) {
        let storage = MemoryAuthStorage::shared();
        UserStorage::create(storage.as_ref(), user).await.unwrap();
        let codec = codec();
        (UserInfoService::new(storage, codec.clone()), codec)
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc"), None), Some("abc"));
        assert_eq!(extract_bearer(Some("bearer abc"), None), Some("abc"));
        assert_eq!(extract_bearer(Some("BEARER  abc "), None), Some("abc"));
        assert_eq!(extract_bearer(Some("Basic abc"), Some("q")), Some("q"));
        assert_eq!(extract_bearer(None, Some("q")), Some("q"));
        assert_eq!(extract_bearer(Some("Bearer "), None), None);
        assert_eq!(extract_bearer(None, None), None);
    }

    #[tokio::test]
    async fn test_claims_follow_scopes() {
        let user = User::new("jane").with_email("jane@example.com");
        let (service, codec) = setup(&user).await;

        let token = codec
            .mint_access_token(
                &user.id.to_string(),
                "c1",
                &parse_scopes("openid profile email"),
                Duration::hours(1),
            )
            .unwrap();
        let info = service.userinfo(Some(&token)).await.unwrap();
        assert_eq!(info.sub, user.id.to_string());
        assert_eq!(info.preferred_username.as_deref(), Some("jane"));
        assert_eq!(info.email.as_deref(), Some("jane@example.com"));
        assert_eq!(info.email_verified, Some(true));

        let token = codec
            .mint_access_token(
                &user.id.to_string(),
                "c1",
                &parse_scopes("openid"),
                Duration::hours(1),
            )
            .unwrap();
        let info = service.userinfo(Some(&token)).await.unwrap();
        assert_eq!(
            info,
            UserInfoResponse {
                sub: user.id.to_string(),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_email_scope_without_email() {
        let user = User::new("noemail");
        let (service, codec) = setup(&user).await;
        let token = codec
            .mint_access_token(&user.id.to_string(), "c1", &parse_scopes("email"), Duration::hours(1))
            .unwrap();

        let info = service.userinfo(Some(&token)).await.unwrap();
        assert!(info.email.is_none());
        assert!(info.email_verified.is_none());
    }

    #[tokio::test]
    async fn test_rejections() {
        let user = User::new("jane");
        let (service, codec) = setup(&user).await;

        let err = service.userinfo(None).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));

        let err = service.userinfo(Some("not-a-jwt")).await.unwrap_err();
        assert_eq!(err.public_description(), "Invalid or expired access token");

        let stranger = codec
            .mint_access_token(
                &uuid::Uuid::new_v4().to_string(),
                "c1",
                &[],
                Duration::hours(1),
            )
            .unwrap();
        let err = service.userinfo(Some(&stranger)).await.unwrap_err();
        assert_eq!(err.public_description(), "User not found");
    }

    #[tokio::test]
    async fn test_inactive_user_rejected() {
        let mut user = User::new("gone");
        user.active = false;
        let (service, codec) = setup(&user).await;
        let token = codec
            .mint_access_token(&user.id.to_string(), "c1", &[], Duration::hours(1))
            .unwrap();

        let err = service.userinfo(Some(&token)).await.unwrap_err();
        assert_eq!(err.public_description(), "User not found");
    }
}
