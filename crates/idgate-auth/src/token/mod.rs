//! Token minting, verification and the token endpoint.
//!
//! - [`jwt`] - HS256 access and ID tokens
//! - [`refresh`] - opaque refresh tokens with rotation
//! - [`service`] - grant dispatch for the token endpoint

pub mod jwt;
pub mod refresh;
pub mod service;

pub use jwt::{
    AccessTokenClaims, IdTokenClaims, JWT_SECRET_ENV, Jwks, SigningSecret, TokenCodec, TokenError,
};
pub use refresh::RefreshTokenStore;
pub use service::TokenService;
