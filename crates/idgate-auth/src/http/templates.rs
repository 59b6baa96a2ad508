//! Server-rendered HTML for the login, consent, account and error pages.

use crate::oauth::authorize::ConsentPrompt;
use crate::types::Scope;

/// Styles shared by every page.
const SHARED_STYLES: &str = r#"
:root {
    --accent: #2f6fed;
    --accent-hover: #2358c4;
    --danger: #d64545;
    --surface: #ffffff;
    --background: #f3f5f9;
    --border: #dde2eb;
    --text: #1d2433;
    --text-muted: #5c6679;
    --radius: 10px;
}

* { box-sizing: border-box; }

body {
    margin: 0;
    min-height: 100vh;
    display: flex;
    align-items: center;
    justify-content: center;
    background: var(--background);
    color: var(--text);
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    font-size: 15px;
}

.container { width: 100%; max-width: 420px; padding: 24px; }

.card {
    background: var(--surface);
    border: 1px solid var(--border);
    border-radius: var(--radius);
    padding: 28px;
    box-shadow: 0 8px 24px rgba(29, 36, 51, 0.06);
}

.card-title { font-size: 20px; font-weight: 600; margin-bottom: 18px; }
.subtitle { color: var(--text-muted); margin-bottom: 18px; }

.form-group { margin-bottom: 16px; }
.form-label { display: block; font-weight: 500; margin-bottom: 6px; }
.form-input {
    width: 100%;
    padding: 10px 12px;
    border: 1px solid var(--border);
    border-radius: 8px;
    font-size: 15px;
}
.form-input:focus { outline: 2px solid var(--accent); border-color: transparent; }

.btn {
    display: block;
    width: 100%;
    padding: 11px 14px;
    border-radius: 8px;
    border: 1px solid var(--border);
    font-size: 15px;
    font-weight: 500;
    text-align: center;
    text-decoration: none;
    cursor: pointer;
    background: var(--surface);
    color: var(--text);
}
.btn + .btn { margin-top: 10px; }
.btn-primary { background: var(--accent); border-color: var(--accent); color: #fff; }
.btn-primary:hover { background: var(--accent-hover); }

.button-row { display: flex; gap: 10px; margin-top: 20px; }
.button-row .btn + .btn { margin-top: 0; }

.divider {
    text-align: center;
    color: var(--text-muted);
    margin: 20px 0 14px;
    font-size: 13px;
}

.alert { padding: 10px 12px; border-radius: 8px; margin-bottom: 16px; }
.alert-error { background: rgba(214, 69, 69, 0.1); color: var(--danger); }

.scope-list { list-style: none; padding: 0; margin: 0; }
.scope-list li { padding: 10px 0; border-bottom: 1px solid var(--border); }
.scope-list li:last-child { border-bottom: none; }
.scope-name { font-weight: 500; }
.scope-description { color: var(--text-muted); font-size: 13px; }

.redirect-note { color: var(--text-muted); font-size: 13px; margin-top: 16px; word-break: break-all; }

.error-title { font-size: 20px; font-weight: 600; margin-bottom: 10px; }
.error-description { color: var(--text-muted); margin-bottom: 14px; }
.error-code { font-family: ui-monospace, monospace; font-size: 13px; color: var(--danger); }
"#;

/// Wraps page content in the shared layout.
fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + SHARED_STYLES.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str(" - idgate</title>\n");
    html.push_str("    <style>");
    html.push_str(SHARED_STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

/// Renders the password login page.
///
/// `providers` are the enabled social providers; each gets a button that
/// starts `/auth/{provider}`.
pub fn render_login_form(error: Option<&str>, providers: &[&str]) -> String {
    let mut content = String::with_capacity(4096);

    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"card-title\">Sign in</div>\n\n");

    if let Some(e) = error {
        content.push_str("<div class=\"alert alert-error\">");
        content.push_str(&html_escape(e));
        content.push_str("</div>\n\n");
    }

    content.push_str("<form method=\"POST\" action=\"/login\">\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"username\">Username</label>\n");
    content
        .push_str("<input type=\"text\" id=\"username\" name=\"username\" class=\"form-input\" ");
    content.push_str("required autofocus autocomplete=\"username\">\n");
    content.push_str("</div>\n\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"password\">Password</label>\n");
    content.push_str(
        "<input type=\"password\" id=\"password\" name=\"password\" class=\"form-input\" ",
    );
    content.push_str("required autocomplete=\"current-password\">\n");
    content.push_str("</div>\n\n");

    content.push_str("<button type=\"submit\" class=\"btn btn-primary\">Sign in</button>\n");
    content.push_str("</form>\n");

    if !providers.is_empty() {
        content.push_str("\n<div class=\"divider\">or continue with</div>\n");
        for provider in providers {
            content.push_str("<a class=\"btn\" href=\"/auth/");
            content.push_str(&html_escape(provider));
            content.push_str("\">");
            content.push_str(&html_escape(provider_label(provider)));
            content.push_str("</a>\n");
        }
    }

    content.push_str("</div>");

    html_page("Sign In", &content)
}

/// Renders the consent page.
///
/// The form posts back to `/oauth/authorize` with the prompt carried in
/// hidden fields, one `scopes[]` field per scope, and `approved` set by the
/// button that was pressed.
pub fn render_consent_form(prompt: &ConsentPrompt, known_scopes: &[Scope]) -> String {
    let mut content = String::with_capacity(4096);

    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"card-title\">Authorize ");
    content.push_str(&html_escape(&prompt.client_name));
    content.push_str("</div>\n");
    content.push_str("<div class=\"subtitle\">");
    content.push_str(&html_escape(&prompt.client_name));
    content.push_str(" is requesting access to your account.</div>\n\n");

    if !prompt.scopes.is_empty() {
        content.push_str("<ul class=\"scope-list\">\n");
        for scope in &prompt.scopes {
            content.push_str("<li><div class=\"scope-name\">");
            content.push_str(&html_escape(scope));
            content.push_str("</div>");
            if let Some(known) = known_scopes.iter().find(|s| &s.name == scope) {
                content.push_str("<div class=\"scope-description\">");
                content.push_str(&html_escape(&known.description));
                content.push_str("</div>");
            }
            content.push_str("</li>\n");
        }
        content.push_str("</ul>\n\n");
    }

    content.push_str("<form method=\"POST\" action=\"/oauth/authorize\">\n");
    hidden_field(&mut content, "client_id", &prompt.client_id);
    hidden_field(&mut content, "redirect_uri", &prompt.redirect_uri);
    if let Some(state) = &prompt.state {
        hidden_field(&mut content, "state", state);
    }
    for scope in &prompt.scopes {
        hidden_field(&mut content, "scopes[]", scope);
    }
    if let Some(challenge) = &prompt.code_challenge {
        hidden_field(&mut content, "code_challenge", challenge);
    }
    if let Some(method) = &prompt.code_challenge_method {
        hidden_field(&mut content, "code_challenge_method", method);
    }

    content.push_str("<div class=\"button-row\">\n");
    content.push_str(
        "<button type=\"submit\" name=\"approved\" value=\"0\" class=\"btn\">Deny</button>\n",
    );
    content.push_str(
        "<button type=\"submit\" name=\"approved\" value=\"1\" class=\"btn btn-primary\">Allow</button>\n",
    );
    content.push_str("</div>\n</form>\n\n");

    content.push_str("<div class=\"redirect-note\">You will be redirected to ");
    content.push_str(&html_escape(&prompt.redirect_uri));
    content.push_str("</div>\n</div>");

    html_page("Authorize", &content)
}

/// Renders the signed-in account page with connect buttons for providers
/// that are not linked yet.
pub fn render_account_page(username: &str, linked: &[&str], available: &[&str]) -> String {
    let mut content = String::with_capacity(2048);

    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"card-title\">Signed in as ");
    content.push_str(&html_escape(username));
    content.push_str("</div>\n\n");

    if !linked.is_empty() {
        content.push_str("<div class=\"subtitle\">Connected accounts</div>\n");
        content.push_str("<ul class=\"scope-list\">\n");
        for provider in linked {
            content.push_str("<li><div class=\"scope-name\">");
            content.push_str(&html_escape(provider_label(provider)));
            content.push_str("</div></li>\n");
        }
        content.push_str("</ul>\n\n");
    }

    for provider in available.iter().filter(|p| !linked.contains(p)) {
        content.push_str("<a class=\"btn\" href=\"/auth/");
        content.push_str(&html_escape(provider));
        content.push_str("\">Connect ");
        content.push_str(&html_escape(provider_label(provider)));
        content.push_str("</a>\n");
    }

    content.push_str("\n<div class=\"divider\"></div>\n");
    content.push_str("<a class=\"btn\" href=\"/logout\">Sign out</a>\n</div>");

    html_page("Account", &content)
}

/// Renders an error page.
pub fn render_error_page(error_code: &str, error_description: &str) -> String {
    let mut content = String::with_capacity(1024);

    content.push_str("<div class=\"card\" style=\"text-align: center;\">\n");
    content.push_str("<div class=\"error-title\">Authorization Error</div>\n");
    content.push_str("<div class=\"error-description\">");
    content.push_str(&html_escape(error_description));
    content.push_str("</div>\n");
    content.push_str("<div class=\"error-code\">");
    content.push_str(&html_escape(error_code));
    content.push_str("</div>\n</div>");

    html_page("Error", &content)
}

fn hidden_field(content: &mut String, name: &str, value: &str) {
    content.push_str("<input type=\"hidden\" name=\"");
    content.push_str(&html_escape(name));
    content.push_str("\" value=\"");
    content.push_str(&html_escape(value));
    content.push_str("\">\n");
}

fn provider_label(provider: &str) -> &str {
    match provider {
        "google" => "Google",
        "github" => "GitHub",
        other => other,
    }
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> ConsentPrompt {
        ConsentPrompt {
            client_id: "app".to_string(),
            client_name: "Test <App>".to_string(),
            redirect_uri: "https://app.example.com/cb".to_string(),
            state: Some("xyz".to_string()),
            scopes: vec!["openid".to_string(), "email".to_string()],
            code_challenge: None,
            code_challenge_method: None,
        }
    }

    #[test]
    fn test_login_form_with_error_and_providers() {
        let html = render_login_form(Some("Invalid username or password"), &["github", "google"]);
        assert!(html.contains("class=\"alert alert-error\""));
        assert!(html.contains("Invalid username or password"));
        assert!(html.contains("href=\"/auth/github\">GitHub</a>"));
        assert!(html.contains("href=\"/auth/google\">Google</a>"));
    }

    #[test]
    fn test_login_form_without_providers() {
        let html = render_login_form(None, &[]);
        assert!(!html.contains("class=\"alert alert-error\""));
        assert!(!html.contains("or continue with"));
    }

    #[test]
    fn test_consent_form_fields() {
        let html = render_consent_form(&prompt(), &Scope::defaults());

        assert!(html.contains("Test &lt;App&gt;"));
        assert!(html.contains("name=\"client_id\" value=\"app\""));
        assert!(html.contains("name=\"state\" value=\"xyz\""));
        assert!(html.contains("name=\"scopes[]\" value=\"openid\""));
        assert!(html.contains("name=\"scopes[]\" value=\"email\""));
        assert!(html.contains("name=\"approved\" value=\"1\""));
        assert!(html.contains("name=\"approved\" value=\"0\""));
        assert!(html.contains("Read your email address"));
        assert!(!html.contains("code_challenge"));
    }

    #[test]
    fn test_account_page_hides_linked_providers() {
        let html = render_account_page("jane", &["google"], &["github", "google"]);
        assert!(html.contains("Signed in as jane"));
        assert!(html.contains("Connect GitHub"));
        assert!(!html.contains("Connect Google"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>\"a\" & 'b'</script>"),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
    }
}
