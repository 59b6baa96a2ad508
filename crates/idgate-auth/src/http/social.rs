//! Social login handlers.
//!
//! ```text
//! GET /auth/{provider}
//!     └─► store CSRF state in session → 303 provider login page
//!
//! GET /auth/{provider}/callback?code=...&state=...
//!     ├─► error / missing code / state mismatch → 303 /login?error=social_login_failed
//!     ├─► signed in → link identity → 303 /account
//!     └─► resolve user → sign in → 303 parked authorization or /account
//! ```

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::{AuthState, error_page, resume_target};
use crate::crypto::random_hex;

/// Where a failed social login ends up.
const LOGIN_FAILED: &str = "/login?error=social_login_failed";

/// Bytes of randomness in the CSRF state.
const STATE_BYTES: usize = 16;

/// Query parameters of the provider callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code from the provider.
    #[serde(default)]
    pub code: Option<String>,
    /// CSRF state echoed by the provider.
    #[serde(default)]
    pub state: Option<String>,
    /// Error reported by the provider.
    #[serde(default)]
    pub error: Option<String>,
}

/// GET /auth/{provider} handler.
pub async fn social_login(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Response {
    if let Err(e) = state.social.providers().get(&provider) {
        return error_page(&e);
    }

    let csrf_state = random_hex(STATE_BYTES);
    let redirect_uri = state.url(&format!("/auth/{provider}/callback"));

    let mut session = match state.sessions.load_or_new(&jar).await {
        Ok(session) => session,
        Err(e) => return error_page(&e),
    };
    session.social_state = Some(csrf_state.clone());
    session.oauth_redirect_uri = Some(redirect_uri.clone());

    let jar = match state.sessions.save(jar, &session).await {
        Ok(jar) => jar,
        Err(e) => return error_page(&e),
    };

    match state
        .social
        .authorization_url(&provider, &redirect_uri, &csrf_state)
    {
        Ok(url) => (jar, Redirect::to(url.as_str())).into_response(),
        Err(e) => error_page(&e),
    }
}

/// GET /auth/{provider}/callback handler.
pub async fn social_callback(
    State(state): State<AuthState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        tracing::warn!(provider = %provider, error = %error, "Provider returned an error");
        return Redirect::to(LOGIN_FAILED).into_response();
    }
    let Some(code) = query.code.as_deref() else {
        tracing::warn!(provider = %provider, "Provider callback without code");
        return Redirect::to(LOGIN_FAILED).into_response();
    };

    let mut session = match state.sessions.load(&jar).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::warn!(provider = %provider, "Provider callback without a session");
            return Redirect::to(LOGIN_FAILED).into_response();
        }
        Err(e) => return error_page(&e),
    };

    // The state is single use whatever the outcome.
    let expected_state = session.social_state.take();
    let redirect_uri = session.oauth_redirect_uri.take();
    let jar = match state.sessions.save(jar, &session).await {
        Ok(jar) => jar,
        Err(e) => return error_page(&e),
    };

    if expected_state.is_none() || expected_state != query.state {
        tracing::warn!(provider = %provider, "Social login state mismatch");
        return (jar, Redirect::to(LOGIN_FAILED)).into_response();
    }
    let Some(redirect_uri) = redirect_uri else {
        tracing::warn!(provider = %provider, "Session has no provider redirect URI");
        return (jar, Redirect::to(LOGIN_FAILED)).into_response();
    };

    if let Some(user_id) = session.user_id {
        return match state
            .social
            .link_account(&provider, code, &redirect_uri, user_id)
            .await
        {
            Ok(_) => (jar, Redirect::to("/account")).into_response(),
            Err(e) if e.is_server_error() => error_page(&e),
            Err(e) => {
                tracing::warn!(provider = %provider, user_id = %user_id, error = %e, "Account linking failed");
                (jar, Redirect::to(LOGIN_FAILED)).into_response()
            }
        };
    }

    let user = match state.social.authenticate(&provider, code, &redirect_uri).await {
        Ok(user) if user.active => user,
        Ok(user) => {
            tracing::warn!(provider = %provider, user_id = %user.id, "Social login for disabled account");
            return (jar, Redirect::to(LOGIN_FAILED)).into_response();
        }
        Err(e) => {
            tracing::warn!(provider = %provider, error = %e, "Social login failed");
            return (jar, Redirect::to(LOGIN_FAILED)).into_response();
        }
    };

    let mut session = match state.sessions.sign_in(Some(session), user.id).await {
        Ok(session) => session,
        Err(e) => return error_page(&e),
    };
    let target = resume_target(&mut session);

    match state.sessions.save(jar, &session).await {
        Ok(jar) => (jar, Redirect::to(&target)).into_response(),
        Err(e) => error_page(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::*;
    use crate::social::SocialProviderRegistry;
    use crate::social::provider::{ProviderError, ProviderTokens, SocialProfile, SocialProvider};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;
    use url::Url;

    /// Accepts the code `good` and answers with a fixed profile.
    struct StubProvider;

    #[async_trait]
    impl SocialProvider for StubProvider {
        fn name(&self) -> &str {
            "google"
        }

        fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, ProviderError> {
            let mut url = Url::parse("https://accounts.example.com/auth")?;
            url.query_pairs_mut()
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("state", state);
            Ok(url)
        }

        async fn exchange_code(
            &self,
            code: &str,
            _redirect_uri: &str,
        ) -> Result<ProviderTokens, ProviderError> {
            if code != "good" {
                return Err(ProviderError::TokenExchange("invalid_grant".to_string()));
            }
            Ok(ProviderTokens {
                access_token: "provider-access".to_string(),
                refresh_token: None,
                expires_in: Some(3600),
            })
        }

        async fn fetch_profile(&self, _access_token: &str) -> Result<SocialProfile, ProviderError> {
            Ok(SocialProfile {
                id: "g-42".to_string(),
                email: Some("sam@example.com".to_string()),
                name: Some("Sam".to_string()),
                avatar_url: None,
                raw: serde_json::json!({ "sub": "g-42" }),
            })
        }
    }

    async fn google_fixture() -> Fixture {
        let mut providers = SocialProviderRegistry::new();
        providers.register(Arc::new(StubProvider));
        fixture_with(providers).await
    }

    /// Starts a social login; returns the session cookie and CSRF state.
    async fn start(fixture: &Fixture, cookie: Option<&str>) -> (String, String) {
        let response = fixture
            .router()
            .oneshot(get("/auth/google", cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let target = Url::parse(&location(&response)).unwrap();
        assert_eq!(target.host_str(), Some("accounts.example.com"));
        let pairs: Vec<(String, String)> = target.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://id.test/auth/google/callback".into()
        )));
        let csrf = pairs.iter().find(|(k, _)| k == "state").unwrap().1.clone();
        assert_eq!(csrf.len(), 32);

        let cookie = session_cookie(&response)
            .or_else(|| cookie.map(str::to_string))
            .unwrap();
        (cookie, csrf)
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let fixture = google_fixture().await;

        let response = fixture
            .router()
            .oneshot(get("/auth/myspace", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let fixture = google_fixture().await;
        let (cookie, csrf) = start(&fixture, None).await;

        let response = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?code=good&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();

        assert_eq!(location(&response), "/account");
        let signed_in = session_cookie(&response).unwrap();
        assert_ne!(signed_in, cookie);

        let user = fixture
            .storage
            .users
            .find_by_username("sam")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email.as_deref(), Some("sam@example.com"));

        let account = fixture
            .router()
            .oneshot(get("/account", Some(&signed_in)))
            .await
            .unwrap();
        assert!(body_string(account).await.contains("Signed in as sam"));
    }

    #[tokio::test]
    async fn test_state_mismatch() {
        let fixture = google_fixture().await;
        let (cookie, csrf) = start(&fixture, None).await;

        let response = fixture
            .router()
            .oneshot(get(
                "/auth/google/callback?code=good&state=forged",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), LOGIN_FAILED);

        // The state was consumed by the failed attempt.
        let retry = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?code=good&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(location(&retry), LOGIN_FAILED);
        assert!(
            fixture
                .storage
                .users
                .find_by_username("sam")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_provider_error_and_missing_code() {
        let fixture = google_fixture().await;
        let (cookie, csrf) = start(&fixture, None).await;

        let denied = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?error=access_denied&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(location(&denied), LOGIN_FAILED);

        let no_code = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(location(&no_code), LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_callback_without_session() {
        let fixture = google_fixture().await;

        let response = fixture
            .router()
            .oneshot(get("/auth/google/callback?code=good&state=abc", None))
            .await
            .unwrap();

        assert_eq!(location(&response), LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_exchange_failure() {
        let fixture = google_fixture().await;
        let (cookie, csrf) = start(&fixture, None).await;

        let response = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?code=bad&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();

        assert_eq!(location(&response), LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_signed_in_user_links_account() {
        let fixture = google_fixture().await;
        let cookie = sign_in(&fixture).await;
        let (cookie, csrf) = start(&fixture, Some(&cookie)).await;

        let response = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?code=good&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(location(&response), "/account");

        let linked = fixture
            .storage
            .social_accounts
            .find_by_user(fixture.user.id)
            .await
            .unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].provider, "google");
        assert_eq!(linked[0].provider_user_id, "g-42");
    }

    #[tokio::test]
    async fn test_social_login_replays_pending_authorization() {
        let fixture = google_fixture().await;

        let authorize = fixture
            .router()
            .oneshot(get(
                &format!(
                    "/oauth/authorize?response_type=code&client_id=app&redirect_uri={}&state=s9",
                    urlencoding::encode(REDIRECT_URI)
                ),
                None,
            ))
            .await
            .unwrap();
        let anonymous = session_cookie(&authorize).unwrap();
        let (cookie, csrf) = start(&fixture, Some(&anonymous)).await;

        let response = fixture
            .router()
            .oneshot(get(
                &format!("/auth/google/callback?code=good&state={csrf}"),
                Some(&cookie),
            ))
            .await
            .unwrap();

        let target = location(&response);
        assert!(target.starts_with("/oauth/authorize?"));
        assert!(target.contains("state=s9"));
    }
}
