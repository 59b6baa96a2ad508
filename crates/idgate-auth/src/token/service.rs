//! Token endpoint grant dispatch.
//!
//! [`TokenService::exchange`] implements the `authorization_code` and
//! `refresh_token` grants. Each failed check returns its own `invalid_grant`
//! description.
//!
//! # Example
//!
//! ```ignore
//! let credentials = extract_client_credentials(auth_header, form.client_id.as_deref(), form.client_secret.as_deref())?;
//! let response = token_service.exchange(&form, credentials).await?;
//! ```

use std::sync::Arc;

use time::Duration;

use crate::oauth::client_auth::{ClientCredentials, authenticate_client};
use crate::oauth::codes::AuthorizationCodeStore;
use crate::oauth::token::{TokenRequest, TokenResponse};
use crate::storage::{ClientStorage, UserStorage};
use crate::token::jwt::TokenCodec;
use crate::token::refresh::RefreshTokenStore;
use crate::types::{GrantType, has_scope, join_scopes, scope::OPENID};
use crate::{AuthError, AuthResult};

/// Exchanges grants for tokens.
#[derive(Clone)]
pub struct TokenService {
    clients: Arc<dyn ClientStorage>,
    users: Arc<dyn UserStorage>,
    codes: AuthorizationCodeStore,
    refresh_tokens: RefreshTokenStore,
    codec: Arc<TokenCodec>,
    access_token_lifetime: Duration,
}

impl TokenService {
    /// Creates a token service.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        users: Arc<dyn UserStorage>,
        codes: AuthorizationCodeStore,
        refresh_tokens: RefreshTokenStore,
        codec: Arc<TokenCodec>,
        access_token_lifetime: Duration,
    ) -> Self {
        Self {
            clients,
            users,
            codes,
            refresh_tokens,
            codec,
            access_token_lifetime,
        }
    }

    /// Access token lifetime in whole seconds, as reported in `expires_in`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from(self.access_token_lifetime.whole_seconds()).unwrap_or(0)
    }

    /// Handles a token request.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if required parameters are missing
    /// - `InvalidClient` if client authentication fails
    /// - `InvalidGrant` if the code or refresh token is unusable
    /// - `UnsupportedGrantType` for any other grant type
    /// - storage or internal errors if persistence or signing fails
    pub async fn exchange(
        &self,
        request: &TokenRequest,
        credentials: ClientCredentials,
    ) -> AuthResult<TokenResponse> {
        let (Some(grant_type), Some(client_id)) = (
            non_empty(&request.grant_type),
            credentials.client_id.as_deref().filter(|id| !id.is_empty()),
        ) else {
            return Err(AuthError::invalid_request("Missing required parameters"));
        };
        let client_secret = credentials.client_secret.as_deref();

        match grant_type.parse::<GrantType>() {
            Ok(GrantType::AuthorizationCode) => {
                self.authorization_code_grant(request, client_id, client_secret)
                    .await
            }
            Ok(GrantType::RefreshToken) => {
                self.refresh_token_grant(request, client_id, client_secret)
                    .await
            }
            _ => {
                tracing::debug!(client_id = %client_id, grant_type = %grant_type, "Unsupported grant type");
                Err(AuthError::unsupported_grant_type(grant_type))
            }
        }
    }

    async fn authorization_code_grant(
        &self,
        request: &TokenRequest,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        let (Some(code_value), Some(redirect_uri)) =
            (non_empty(&request.code), non_empty(&request.redirect_uri))
        else {
            return Err(AuthError::invalid_request("Missing required parameters"));
        };

        let client = authenticate_client(client_id, client_secret, self.clients.as_ref()).await?;

        let code = self
            .codes
            .find(code_value)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Authorization code not found"))?;

        if code.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                "Authorization code presented by a client it was not issued to"
            );
            return Err(AuthError::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }

        if code.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_grant("Redirect URI mismatch"));
        }

        if !code.is_valid() || !self.codes.mark_used(code_value).await? {
            tracing::debug!(client_id = %client.client_id, "Authorization code rejected: expired or already used");
            return Err(AuthError::invalid_grant(
                "Authorization code is expired or already used",
            ));
        }

        let subject = code.user_id.to_string();
        let access_token = self.codec.mint_access_token(
            &subject,
            &client.client_id,
            &code.scopes,
            self.access_token_lifetime,
        )?;

        let mut response =
            TokenResponse::new(access_token, self.expires_in(), join_scopes(&code.scopes));

        if has_scope(&code.scopes, OPENID) {
            let user = self
                .users
                .find_by_id(code.user_id)
                .await?
                .ok_or_else(|| AuthError::invalid_grant("User not found"))?;
            let id_token = self.codec.mint_id_token(
                &user,
                &client.client_id,
                &code.scopes,
                code.created_at,
                self.access_token_lifetime,
            )?;
            response = response.with_id_token(id_token);
        }

        let refresh_token = self
            .refresh_tokens
            .issue(&client.client_id, code.user_id, code.scopes.clone())
            .await?;

        tracing::info!(client_id = %client.client_id, user_id = %code.user_id, "Authorization code exchanged");
        Ok(response.with_refresh_token(refresh_token))
    }

    async fn refresh_token_grant(
        &self,
        request: &TokenRequest,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        let Some(token_value) = non_empty(&request.refresh_token) else {
            return Err(AuthError::invalid_request("Missing refresh_token parameter"));
        };

        let client = authenticate_client(client_id, client_secret, self.clients.as_ref()).await?;

        let current = self
            .refresh_tokens
            .find_by_token(token_value)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("Refresh token not found"))?;

        if current.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                "Refresh token presented by a client it was not issued to"
            );
            return Err(AuthError::invalid_grant(
                "Refresh token was issued to another client",
            ));
        }

        if !current.is_valid() {
            return Err(AuthError::invalid_grant("Refresh token is expired or revoked"));
        }

        let access_token = self.codec.mint_access_token(
            &current.user_id.to_string(),
            &client.client_id,
            &current.scopes,
            self.access_token_lifetime,
        )?;

        let Some(new_refresh_token) = self.refresh_tokens.rotate(&current).await? else {
            tracing::warn!(
                client_id = %client.client_id,
                user_id = %current.user_id,
                "Refresh token rotation lost to a concurrent request"
            );
            return Err(AuthError::invalid_grant("Refresh token is expired or revoked"));
        };

        tracing::info!(client_id = %client.client_id, user_id = %current.user_id, "Refresh token rotated");
        Ok(
            TokenResponse::new(access_token, self.expires_in(), join_scopes(&current.scopes))
                .with_refresh_token(new_refresh_token),
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_secret;
    use crate::storage::{AuthorizationCodeStorage, MemoryAuthStorage, RefreshTokenStorage};
    use crate::token::jwt::SigningSecret;
    use crate::types::{AuthorizationCode, Client, RefreshToken, User, parse_scopes};
    use time::OffsetDateTime;
    use uuid::Uuid;

    const ISSUER: &str = "http://localhost:8765";
    const REDIRECT: &str = "https://app.example.com/callback";
    const SECRET: &str = "s3cret";

    struct Fixture {
        storage: Arc<MemoryAuthStorage>,
        service: TokenService,
        codec: Arc<TokenCodec>,
        codes: AuthorizationCodeStore,
        refresh: RefreshTokenStore,
        user: User,
    }

    fn client(client_id: &str, secret: Option<&str>) -> Client {
        let now = OffsetDateTime::now_utc();
        Client {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            client_secret_hash: secret.map(|s| hash_secret(s).unwrap()),
            name: client_id.to_string(),
            redirect_uris: vec![REDIRECT.to_string()],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            scopes: vec![],
            confidential: secret.is_some(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn fixture() -> Fixture {
        let storage = MemoryAuthStorage::shared();
        ClientStorage::create(storage.as_ref(), &client("c1", Some(SECRET)))
            .await
            .unwrap();
        ClientStorage::create(storage.as_ref(), &client("c2", Some(SECRET)))
            .await
            .unwrap();
        ClientStorage::create(storage.as_ref(), &client("spa", None))
            .await
            .unwrap();

        let user = User::new("alice").with_email("alice@example.com");
        UserStorage::create(storage.as_ref(), &user).await.unwrap();

        let codec = Arc::new(TokenCodec::new(
            &SigningSecret::from_value("0123456789abcdef0123456789abcdef"),
            ISSUER,
        ));
        let codes = AuthorizationCodeStore::new(storage.clone(), Duration::minutes(10));
        let refresh = RefreshTokenStore::new(storage.clone(), Duration::days(30));
        let service = TokenService::new(
            storage.clone(),
            storage.clone(),
            codes.clone(),
            refresh.clone(),
            codec.clone(),
            Duration::hours(1),
        );

        Fixture {
            storage,
            service,
            codec,
            codes,
            refresh,
            user,
        }
    }

    impl Fixture {
        async fn issue_code(&self, client_id: &str, scope: &str) -> String {
            self.codes
                .issue(client_id, self.user.id, REDIRECT, parse_scopes(scope), None, None)
                .await
                .unwrap()
        }
    }

    fn code_request(code: &str, redirect_uri: &str) -> TokenRequest {
        TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            code: Some(code.to_string()),
            redirect_uri: Some(redirect_uri.to_string()),
            ..Default::default()
        }
    }

    fn refresh_request(token: &str) -> TokenRequest {
        TokenRequest {
            grant_type: Some("refresh_token".to_string()),
            refresh_token: Some(token.to_string()),
            ..Default::default()
        }
    }

    fn c1() -> ClientCredentials {
        ClientCredentials::post("c1", SECRET)
    }

    fn assert_invalid_grant(err: AuthError, expected: &str) {
        match err {
            AuthError::InvalidGrant { message } => assert_eq!(message, expected),
            other => panic!("expected invalid_grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_code_exchange_with_openid() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid profile email").await;

        let response = f
            .service
            .exchange(&code_request(&code, REDIRECT), c1())
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope, "openid profile email");
        assert!(response.refresh_token.is_some());

        let claims = f.codec.verify_access_token(&response.access_token).unwrap();
        assert_eq!(claims.sub, f.user.id.to_string());
        assert_eq!(claims.aud, "c1");

        let id_claims = f
            .codec
            .verify_id_token(response.id_token.as_deref().unwrap())
            .unwrap();
        assert_eq!(id_claims.preferred_username.as_deref(), Some("alice"));
        assert_eq!(id_claims.email.as_deref(), Some("alice@example.com"));
        assert_eq!(id_claims.email_verified, Some(true));
    }

    #[tokio::test]
    async fn test_code_exchange_without_openid_has_no_id_token() {
        let f = fixture().await;
        let code = f.issue_code("c1", "profile").await;

        let response = f
            .service
            .exchange(&code_request(&code, REDIRECT), c1())
            .await
            .unwrap();
        assert!(response.id_token.is_none());
        assert!(response.refresh_token.is_some());
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid").await;

        f.service
            .exchange(&code_request(&code, REDIRECT), c1())
            .await
            .unwrap();
        let err = f
            .service
            .exchange(&code_request(&code, REDIRECT), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Authorization code is expired or already used");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_code_exchange_has_one_winner() {
        let f = fixture().await;
        let code = f.issue_code("c1", "profile").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let request = code_request(&code, REDIRECT);
            handles.push(tokio::spawn(async move {
                service.exchange(&request, c1()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_invalid_grant(err, "Authorization code is expired or already used"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_code_bound_to_redirect_uri() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid").await;

        let err = f
            .service
            .exchange(&code_request(&code, "https://app.example.com/other"), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Redirect URI mismatch");

        // A mismatch does not burn the code.
        assert!(!f.codes.find(&code).await.unwrap().unwrap().used);
    }

    #[tokio::test]
    async fn test_code_bound_to_client() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid").await;

        let err = f
            .service
            .exchange(
                &code_request(&code, REDIRECT),
                ClientCredentials::post("c2", SECRET),
            )
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Authorization code was issued to another client");
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let f = fixture().await;
        let mut code =
            AuthorizationCode::new("c1", f.user.id, REDIRECT, vec![], Duration::minutes(10));
        code.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        AuthorizationCodeStorage::create(f.storage.as_ref(), &code)
            .await
            .unwrap();

        let err = f
            .service
            .exchange(&code_request(&code.code, REDIRECT), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Authorization code is expired or already used");
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let f = fixture().await;
        let err = f
            .service
            .exchange(&code_request("nope", REDIRECT), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Authorization code not found");
    }

    #[tokio::test]
    async fn test_confidential_client_without_secret() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid").await;

        let err = f
            .service
            .exchange(&code_request(&code, REDIRECT), ClientCredentials::public("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_public_client_exchange() {
        let f = fixture().await;
        let code = f.issue_code("spa", "profile").await;

        let response = f
            .service
            .exchange(&code_request(&code, REDIRECT), ClientCredentials::public("spa"))
            .await
            .unwrap();
        assert_eq!(response.scope, "profile");
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let f = fixture().await;

        let err = f
            .service
            .exchange(&TokenRequest::default(), c1())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let request = TokenRequest {
            grant_type: Some("authorization_code".to_string()),
            ..Default::default()
        };
        let err = f.service.exchange(&request, c1()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let err = f
            .service
            .exchange(&refresh_request(""), c1())
            .await
            .unwrap_err();
        match err {
            AuthError::InvalidRequest { message } => {
                assert_eq!(message, "Missing refresh_token parameter");
            }
            other => panic!("expected invalid_request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_grant_type() {
        let f = fixture().await;
        let request = TokenRequest {
            grant_type: Some("password".to_string()),
            ..Default::default()
        };
        let err = f.service.exchange(&request, c1()).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedGrantType { .. }));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let f = fixture().await;
        let code = f.issue_code("c1", "openid profile").await;
        let first = f
            .service
            .exchange(&code_request(&code, REDIRECT), c1())
            .await
            .unwrap();
        let old = first.refresh_token.unwrap();

        let second = f
            .service
            .exchange(&refresh_request(&old), c1())
            .await
            .unwrap();
        assert_eq!(second.scope, "openid profile");
        assert!(second.id_token.is_none());
        let new = second.refresh_token.unwrap();
        assert_ne!(new, old);

        let err = f
            .service
            .exchange(&refresh_request(&old), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Refresh token is expired or revoked");

        f.service
            .exchange(&refresh_request(&new), c1())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_has_one_winner() {
        let f = fixture().await;
        let token = f
            .refresh
            .issue("c1", f.user.id, vec!["profile".to_string()])
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let request = refresh_request(&token);
            handles.push(tokio::spawn(async move {
                service.exchange(&request, c1()).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token() {
        let f = fixture().await;
        let token = f.refresh.issue("c1", f.user.id, vec![]).await.unwrap();
        f.refresh.revoke(&token).await.unwrap();

        let err = f
            .service
            .exchange(&refresh_request(&token), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Refresh token is expired or revoked");
    }

    #[tokio::test]
    async fn test_expired_refresh_token() {
        let f = fixture().await;
        let (token, mut record) =
            RefreshToken::issue("c1", f.user.id, vec![], Duration::days(30));
        record.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        RefreshTokenStorage::create(f.storage.as_ref(), &record)
            .await
            .unwrap();

        let err = f
            .service
            .exchange(&refresh_request(&token), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Refresh token is expired or revoked");
    }

    #[tokio::test]
    async fn test_refresh_token_bound_to_client() {
        let f = fixture().await;
        let token = f.refresh.issue("c1", f.user.id, vec![]).await.unwrap();

        let err = f
            .service
            .exchange(&refresh_request(&token), ClientCredentials::post("c2", SECRET))
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Refresh token was issued to another client");

        let err = f
            .service
            .exchange(&refresh_request("unknown"), c1())
            .await
            .unwrap_err();
        assert_invalid_grant(err, "Refresh token not found");
    }
}
