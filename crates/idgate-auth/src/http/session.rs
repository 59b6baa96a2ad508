//! Browser session cookie handling.

use std::sync::Arc;

use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use time::Duration;

use crate::AuthResult;
use crate::config::SessionConfig;
use crate::oauth::session::BrowserSession;
use crate::storage::BrowserSessionStorage;

/// Loads and stores the browser session named by the session cookie.
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn BrowserSessionStorage>,
    cookie_name: String,
    lifetime: Duration,
    secure: bool,
}

impl SessionManager {
    /// Creates a session manager.
    #[must_use]
    pub fn new(config: &SessionConfig, storage: Arc<dyn BrowserSessionStorage>) -> Self {
        Self {
            storage,
            cookie_name: config.cookie_name.clone(),
            lifetime: crate::config::to_time_duration(config.lifetime),
            secure: config.secure_cookies,
        }
    }

    /// Returns the session named by the cookie, if it exists and is live.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn load(&self, jar: &CookieJar) -> AuthResult<Option<BrowserSession>> {
        match jar.get(&self.cookie_name) {
            Some(cookie) if !cookie.value().is_empty() => self.storage.find(cookie.value()).await,
            _ => Ok(None),
        }
    }

    /// Returns the current session or a fresh anonymous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn load_or_new(&self, jar: &CookieJar) -> AuthResult<BrowserSession> {
        Ok(self
            .load(jar)
            .await?
            .unwrap_or_else(|| self.new_session()))
    }

    /// Returns the signed-in user of the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage lookup fails.
    pub async fn current_user(&self, jar: &CookieJar) -> AuthResult<Option<uuid::Uuid>> {
        Ok(self.load(jar).await?.and_then(|s| s.user_id))
    }

    /// Persists the session and sets its cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    pub async fn save(&self, jar: CookieJar, session: &BrowserSession) -> AuthResult<CookieJar> {
        self.storage.save(session).await?;
        Ok(jar.add(self.cookie(session.id.clone())))
    }

    /// A fresh anonymous session. It is not stored until saved.
    #[must_use]
    pub fn new_session(&self) -> BrowserSession {
        BrowserSession::new(self.lifetime)
    }

    /// Starts a new session for `user_id`, carrying over the pending
    /// authorization of `previous`, and discards `previous`.
    ///
    /// The session identifier changes on every sign-in. The returned session
    /// is not stored until saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the previous session cannot be deleted.
    pub async fn sign_in(
        &self,
        previous: Option<BrowserSession>,
        user_id: uuid::Uuid,
    ) -> AuthResult<BrowserSession> {
        let mut session = self.new_session();
        if let Some(previous) = previous {
            session.pending_authorization = previous.pending_authorization;
            self.storage.delete(&previous.id).await?;
        }
        session.sign_in(user_id);
        Ok(session)
    }

    /// Deletes the current session and clears its cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn destroy(&self, jar: CookieJar) -> AuthResult<CookieJar> {
        if let Some(cookie) = jar.get(&self.cookie_name) {
            self.storage.delete(cookie.value()).await?;
        }
        Ok(jar.remove(Cookie::build(self.cookie_name.clone()).path("/")))
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.lifetime)
            .build()
    }
}
