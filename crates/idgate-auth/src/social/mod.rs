//! Social login.
//!
//! Providers implement [`SocialProvider`]; [`SocialIdentityResolver`] turns
//! a provider callback into a local [`crate::types::User`].

pub mod github;
pub mod google;
pub mod provider;
pub mod registry;
pub mod resolver;

pub use github::GitHubProvider;
pub use google::GoogleProvider;
pub use provider::{
    DEFAULT_PROVIDER_TIMEOUT, ProviderError, ProviderTokens, SocialProfile, SocialProvider,
};
pub use registry::SocialProviderRegistry;
pub use resolver::SocialIdentityResolver;
