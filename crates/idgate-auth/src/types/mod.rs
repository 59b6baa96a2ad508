//! Core domain types: clients, scopes, codes, tokens, users and linked
//! social accounts.

pub mod authorization_code;
pub mod client;
pub mod refresh_token;
pub mod scope;
pub mod social_account;
pub mod user;

pub use authorization_code::AuthorizationCode;
pub use client::{
    Client, ClientRegistration, ClientRegistrationRequest, ClientValidationError, GrantType,
};
pub use refresh_token::RefreshToken;
pub use scope::{Scope, has_scope, join_scopes, parse_scopes};
pub use social_account::SocialAccount;
pub use user::{NewUser, User};
