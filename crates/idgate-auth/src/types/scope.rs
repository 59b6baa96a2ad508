//! Scope names and helpers for space-delimited scope strings.

use serde::{Deserialize, Serialize};

/// Requests an ID token.
pub const OPENID: &str = "openid";

/// Releases `preferred_username`.
pub const PROFILE: &str = "profile";

/// Releases `email` and `email_verified`.
pub const EMAIL: &str = "email";

/// A named permission unit a client may request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Unique scope name.
    pub name: String,
    /// Human-readable description shown on the consent page.
    pub description: String,
    /// Inactive scopes are hidden from discovery.
    pub active: bool,
}

impl Scope {
    /// Creates an active scope.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            active: true,
        }
    }

    /// The scopes every installation starts with.
    #[must_use]
    pub fn defaults() -> Vec<Scope> {
        vec![
            Scope::new(OPENID, "Sign you in with your account"),
            Scope::new(PROFILE, "Read your username"),
            Scope::new(EMAIL, "Read your email address"),
        ]
    }
}

/// Splits a space-delimited scope string into names.
///
/// Empty segments are dropped and duplicates removed, keeping first-seen order.
#[must_use]
pub fn parse_scopes(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for name in scope.split_whitespace() {
        if !scopes.iter().any(|s| s == name) {
            scopes.push(name.to_string());
        }
    }
    scopes
}

/// Joins scope names with single spaces.
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// Returns `true` if `name` is among `scopes`.
#[must_use]
pub fn has_scope(scopes: &[String], name: &str) -> bool {
    scopes.iter().any(|s| s == name)
}
