//! Password login, logout and the account page.

use axum::Form;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::templates::{render_account_page, render_login_form};
use super::{AuthState, error_page, resume_target};
use crate::error::AuthError;

/// Query parameters of the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Error code set by a failed social login.
    #[serde(default)]
    pub error: Option<String>,
}

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// GET /login handler.
///
/// A signed-in user is sent straight on to the parked authorization request
/// or the account page.
pub async fn login_get(
    State(state): State<AuthState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    let session = match state.sessions.load(&jar).await {
        Ok(session) => session,
        Err(e) => return error_page(&e),
    };

    if let Some(mut session) = session.filter(|s| s.is_authenticated()) {
        let target = resume_target(&mut session);
        return match state.sessions.save(jar, &session).await {
            Ok(jar) => (jar, Redirect::to(&target)).into_response(),
            Err(e) => error_page(&e),
        };
    }

    let message = query.error.as_deref().map(login_error_message);
    Html(render_login_form(message, &provider_names(&state))).into_response()
}

/// POST /login handler.
pub async fn login_post(
    State(state): State<AuthState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match state
        .passwords
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::Unauthorized { message }) => {
            return (
                StatusCode::UNAUTHORIZED,
                Html(render_login_form(Some(&message), &provider_names(&state))),
            )
                .into_response();
        }
        Err(e) => return error_page(&e),
    };

    let previous = match state.sessions.load(&jar).await {
        Ok(previous) => previous,
        Err(e) => return error_page(&e),
    };
    let mut session = match state.sessions.sign_in(previous, user.id).await {
        Ok(session) => session,
        Err(e) => return error_page(&e),
    };
    let target = resume_target(&mut session);

    match state.sessions.save(jar, &session).await {
        Ok(jar) => (jar, Redirect::to(&target)).into_response(),
        Err(e) => error_page(&e),
    }
}

/// GET /logout handler.
pub async fn logout(State(state): State<AuthState>, jar: CookieJar) -> Response {
    match state.sessions.destroy(jar).await {
        Ok(jar) => (jar, Redirect::to("/login")).into_response(),
        Err(e) => error_page(&e),
    }
}

/// GET /account handler.
pub async fn account(State(state): State<AuthState>, jar: CookieJar) -> Response {
    let user_id = match state.sessions.current_user(&jar).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return Redirect::to("/login").into_response(),
        Err(e) => return error_page(&e),
    };

    let user = match state.users.find_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Redirect::to("/logout").into_response(),
        Err(e) => return error_page(&e),
    };
    let linked = match state.social_accounts.find_by_user(user_id).await {
        Ok(accounts) => accounts,
        Err(e) => return error_page(&e),
    };

    let linked: Vec<&str> = linked.iter().map(|a| a.provider.as_str()).collect();
    Html(render_account_page(
        &user.username,
        &linked,
        &provider_names(&state),
    ))
    .into_response()
}

fn provider_names(state: &AuthState) -> Vec<&str> {
    state.social.providers().names().collect()
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "social_login_failed" => "Social login failed. Please try again.",
        _ => "Sign-in failed. Please try again.",
    }
}
