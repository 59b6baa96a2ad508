//! # idgate-auth
//!
//! OAuth 2.0 authorization server and OpenID Connect provider engine for
//! idgate.
//!
//! This crate provides:
//! - The authorization code grant with consent, and refresh token rotation
//! - HS256 access and ID tokens, UserInfo and discovery
//! - Password and social (Google, GitHub) sign-in with browser sessions
//! - Storage traits with an in-memory implementation
//! - Axum handlers for every endpoint
//!
//! ## Modules
//!
//! - [`config`] - Issuer, lifetimes, sessions and social provider settings
//! - [`crypto`] - Secret hashing, random tokens and provider token sealing
//! - [`oauth`] - Authorization flow, client authentication and code issuance
//! - [`token`] - Token codec, refresh token store and grant dispatch
//! - [`social`] - Social login providers and identity resolution
//! - [`storage`] - Storage traits for auth-related data
//! - [`http`] - Axum HTTP handlers for the endpoints

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod oauth;
pub mod social;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError};
pub use crypto::{CryptoError, TokenCipher};
pub use error::{AuthError, ErrorCategory};
pub use http::{AuthState, SessionManager, router};
pub use oauth::{
    AuthorizationFlow, BrowserSession, create_user, disable_user, register_client,
};
pub use social::{SocialIdentityResolver, SocialProviderRegistry};
pub use storage::{
    AuthStorage, AuthorizationCodeStorage, BrowserSessionStorage, ClientStorage,
    MemoryAuthStorage, PurgeReport, RefreshTokenStorage, SocialAccountStorage, UserStorage,
};
pub use token::{SigningSecret, TokenCodec, TokenService};
pub use types::{AuthorizationCode, Client, GrantType, RefreshToken, Scope, SocialAccount, User};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
