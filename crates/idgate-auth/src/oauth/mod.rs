//! OAuth 2.0 and OpenID Connect flows.
//!
//! - [`authorize`] - authorization request validation and consent
//! - [`client_auth`] - client credential extraction and authentication
//! - [`codes`] - single-use authorization codes
//! - [`login`] - password sign-in
//! - [`registration`] - client registration and user provisioning
//! - [`session`] - browser session state for the login and consent pages
//! - [`token`] - token endpoint request and response types
//! - [`userinfo`] - the UserInfo claims

pub mod authorize;
pub mod client_auth;
pub mod codes;
pub mod login;
pub mod registration;
pub mod session;
pub mod token;
pub mod userinfo;

pub use authorize::{
    AuthorizationFlow, AuthorizeOutcome, ConsentDecision, ConsentPrompt, PendingAuthorization,
};
pub use client_auth::{
    ClientCredentials, TokenEndpointAuthMethod, authenticate_client, extract_client_credentials,
};
pub use codes::AuthorizationCodeStore;
pub use login::PasswordAuthenticator;
pub use registration::{create_user, disable_user, register_client};
pub use session::BrowserSession;
pub use token::{OAuthErrorResponse, TokenRequest, TokenResponse};
pub use userinfo::{UserInfoResponse, UserInfoService, extract_bearer};
