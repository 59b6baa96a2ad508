//! Authorization endpoint handlers.
//!
//! ```text
//! GET /oauth/authorize
//!     │
//!     ├─► invalid request → error page (never redirects to an unchecked URI)
//!     ├─► nobody signed in → park request in session → 302 /login
//!     └─► consent page
//!
//! POST /oauth/authorize (consent form)
//!     ├─► deny → 302 redirect_uri?error=access_denied
//!     └─► allow → issue code → 302 redirect_uri?code=...
//! ```

use axum::Form;
use axum::extract::rejection::FormRejection;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use super::templates::render_consent_form;
use super::{AuthState, error_page};
use crate::error::AuthError;
use crate::oauth::authorize::{AuthorizeOutcome, ConsentDecision, PendingAuthorization};

/// GET /oauth/authorize handler.
pub async fn authorize_get(
    State(state): State<AuthState>,
    Query(params): Query<PendingAuthorization>,
    jar: CookieJar,
) -> Response {
    let session = match state.sessions.load(&jar).await {
        Ok(session) => session,
        Err(e) => return error_page(&e),
    };
    let user_id = session.as_ref().and_then(|s| s.user_id);

    match state.flow.authorize(&params, user_id).await {
        Ok(AuthorizeOutcome::LoginRequired(pending)) => {
            let mut session = session.unwrap_or_else(|| state.sessions.new_session());
            session.pending_authorization = Some(pending);
            match state.sessions.save(jar, &session).await {
                Ok(jar) => (jar, Redirect::to("/login")).into_response(),
                Err(e) => error_page(&e),
            }
        }
        Ok(AuthorizeOutcome::ConsentRequired(prompt)) => {
            Html(render_consent_form(&prompt, &state.scopes)).into_response()
        }
        Err(e) => error_page(&e),
    }
}

/// POST /oauth/authorize handler (consent form submission).
pub async fn authorize_post(
    State(state): State<AuthState>,
    jar: CookieJar,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    let user_id = match state.sessions.current_user(&jar).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return error_page(&AuthError::unauthorized("User must be authenticated")),
        Err(e) => return error_page(&e),
    };

    let Ok(Form(pairs)) = form else {
        return error_page(&AuthError::invalid_request("Malformed consent form"));
    };
    let decision = consent_from_form(pairs);

    match state.flow.handle_consent(&decision, user_id).await {
        Ok(target) => Redirect::to(target.as_str()).into_response(),
        Err(e) => error_page(&e),
    }
}

/// Reads the consent form.
///
/// Scopes arrive as repeated `scopes[]` fields; plain `scopes` and indexed
/// `scopes[0]` keys are accepted too.
fn consent_from_form(pairs: Vec<(String, String)>) -> ConsentDecision {
    let mut decision = ConsentDecision::default();
    for (key, value) in pairs {
        match key.as_str() {
            "client_id" => decision.client_id = Some(value),
            "redirect_uri" => decision.redirect_uri = Some(value),
            "state" => decision.state = Some(value),
            "approved" => decision.approved = Some(value),
            "code_challenge" => decision.code_challenge = Some(value),
            "code_challenge_method" => decision.code_challenge_method = Some(value),
            k if k == "scopes" || (k.starts_with("scopes[") && k.ends_with(']')) => {
                decision.scopes.push(value);
            }
            _ => {}
        }
    }
    decision
}
