//! HTTP handlers for the OAuth 2.0 and OpenID Connect endpoints.
//!
//! # Routes
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET/POST /oauth/authorize` | [`authorize`] |
//! | `POST /oauth/token` | [`token`] |
//! | `GET/POST /oauth/userinfo` | [`userinfo`] |
//! | `GET /.well-known/openid-configuration` | [`discovery`] |
//! | `GET /.well-known/jwks.json` | [`discovery`] |
//! | `GET/POST /login`, `GET /logout`, `GET /account` | [`login`] |
//! | `GET /auth/{provider}`, `GET /auth/{provider}/callback` | [`social`] |

pub mod authorize;
pub mod discovery;
pub mod error;
pub mod login;
pub mod session;
pub mod social;
pub mod templates;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;

use crate::config::AuthConfig;
use crate::crypto::TokenCipher;
use crate::error::AuthError;
use crate::oauth::{
    AuthorizationCodeStore, AuthorizationFlow, BrowserSession, PasswordAuthenticator,
    UserInfoService,
};
use crate::social::{SocialIdentityResolver, SocialProviderRegistry};
use crate::storage::{AuthStorage, SocialAccountStorage, UserStorage};
use crate::token::{RefreshTokenStore, TokenCodec, TokenService};
use crate::types::Scope;

pub use session::SessionManager;

/// Shared state of every auth handler.
#[derive(Clone)]
pub struct AuthState {
    /// Issuer URL without trailing slash.
    pub issuer: Arc<str>,
    /// Authorization endpoint flow.
    pub flow: AuthorizationFlow,
    /// Token endpoint grant dispatch.
    pub tokens: TokenService,
    /// UserInfo claims.
    pub userinfo: UserInfoService,
    /// Password sign-in.
    pub passwords: PasswordAuthenticator,
    /// Social login.
    pub social: SocialIdentityResolver,
    /// Browser sessions.
    pub sessions: SessionManager,
    /// Users, for the account page.
    pub users: Arc<dyn UserStorage>,
    /// Linked social accounts, for the account page.
    pub social_accounts: Arc<dyn SocialAccountStorage>,
    /// Token codec, for discovery and JWKS.
    pub codec: Arc<TokenCodec>,
    /// Scopes advertised in discovery and described on the consent page.
    pub scopes: Arc<[Scope]>,
}

impl AuthState {
    /// Wires the engine together from configuration and storage.
    #[must_use]
    pub fn new(
        config: &AuthConfig,
        storage: AuthStorage,
        codec: Arc<TokenCodec>,
        cipher: Arc<TokenCipher>,
        providers: SocialProviderRegistry,
    ) -> Self {
        let codes = AuthorizationCodeStore::new(storage.codes.clone(), config.oauth.code_ttl());
        let refresh_tokens = RefreshTokenStore::new(
            storage.refresh_tokens.clone(),
            config.oauth.refresh_token_ttl(),
        );

        Self {
            issuer: Arc::from(config.issuer()),
            flow: AuthorizationFlow::new(storage.clients.clone(), codes.clone()),
            tokens: TokenService::new(
                storage.clients.clone(),
                storage.users.clone(),
                codes,
                refresh_tokens,
                codec.clone(),
                config.oauth.access_token_ttl(),
            ),
            userinfo: UserInfoService::new(storage.users.clone(), codec.clone()),
            passwords: PasswordAuthenticator::new(storage.users.clone()),
            social: SocialIdentityResolver::new(
                Arc::new(providers),
                storage.users.clone(),
                storage.social_accounts.clone(),
                cipher,
            ),
            sessions: SessionManager::new(&config.session, storage.sessions.clone()),
            users: storage.users,
            social_accounts: storage.social_accounts,
            codec,
            scopes: Arc::from(Scope::defaults()),
        }
    }

    /// Absolute URL of a path on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.issuer, path)
    }
}

/// Builds the router with every auth route.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route(
            "/oauth/authorize",
            get(authorize::authorize_get).post(authorize::authorize_post),
        )
        .route("/oauth/token", axum::routing::post(token::token_handler))
        .route(
            "/oauth/userinfo",
            get(userinfo::userinfo_get).post(userinfo::userinfo_post),
        )
        .route(
            "/.well-known/openid-configuration",
            get(discovery::openid_configuration_handler),
        )
        .route("/.well-known/jwks.json", get(discovery::jwks_handler))
        .route("/login", get(login::login_get).post(login::login_post))
        .route("/logout", get(login::logout))
        .route("/account", get(login::account))
        .route("/auth/{provider}", get(social::social_login))
        .route("/auth/{provider}/callback", get(social::social_callback))
        .with_state(state)
}

/// Renders an error as an HTML page, for the browser-facing routes.
pub(crate) fn error_page(error: &AuthError) -> Response {
    let status = if error.is_server_error() {
        tracing::error!(category = %error.category(), error = %error, "Browser request failed");
        error.status_code()
    } else if matches!(error, AuthError::Unauthorized { .. }) {
        StatusCode::UNAUTHORIZED
    } else {
        tracing::debug!(error = %error, "Browser request rejected");
        StatusCode::BAD_REQUEST
    };

    (
        status,
        Html(templates::render_error_page(
            error.oauth_error_code(),
            &error.public_description(),
        )),
    )
        .into_response()
}

/// Where to send a user who just signed in: the parked authorization
/// request if there is one, otherwise the account page.
///
/// The pending authorization is removed from the session.
pub(crate) fn resume_target(session: &mut BrowserSession) -> String {
    match session.take_pending_authorization() {
        Some(pending) => format!("/oauth/authorize?{}", pending.to_query()),
        None => "/account".to_string(),
    }
}
