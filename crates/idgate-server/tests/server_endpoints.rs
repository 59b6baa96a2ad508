use idgate_auth::types::{ClientRegistrationRequest, NewUser};
use idgate_auth::{AuthStorage, create_user, register_client};
use idgate_server::{AppConfig, build_app, build_state};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::{Response, StatusCode, Url};
use serde_json::Value;
use tokio::task::JoinHandle;

const REDIRECT_URI: &str = "https://app.example.com/callback";

struct TestServer {
    base: String,
    storage: AuthStorage,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn start_server() -> TestServer {
    // Bind to an ephemeral port first so the issuer can point at it
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");

    let mut cfg = AppConfig::default();
    cfg.auth.issuer = base.clone();
    cfg.auth.signing.secret = Some("integration-test-secret-0123456789abcdef".into());

    let storage = AuthStorage::memory();
    let state = build_state(&cfg, storage.clone()).expect("build state");
    let app = build_app(state, cfg.server.body_limit_bytes);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base,
        storage,
        shutdown: tx,
        handle,
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn session_cookie(resp: &Response) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("idgate_session=") && !v.starts_with("idgate_session=;"))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn location(resp: &Response) -> String {
    resp.headers()[LOCATION].to_str().unwrap().to_string()
}

#[tokio::test]
async fn health_and_discovery() {
    let server = start_server().await;
    let client = http_client();
    let base = &server.base;

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client
        .get(format!("{base}/.well-known/openid-configuration"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let doc: Value = resp.json().await.unwrap();
    assert_eq!(doc["issuer"], base.as_str());
    assert_eq!(doc["token_endpoint"], format!("{base}/oauth/token"));

    let resp = client
        .get(format!("{base}/.well-known/jwks.json"))
        .send()
        .await
        .unwrap();
    let jwks: Value = resp.json().await.unwrap();
    assert_eq!(jwks["keys"], serde_json::json!([]));

    server.stop().await;
}

#[tokio::test]
async fn authorization_code_flow_end_to_end() {
    let server = start_server().await;
    let client = http_client();
    let base = server.base.clone();

    let registration = register_client(
        server.storage.clients.as_ref(),
        ClientRegistrationRequest::new("Web App", vec![REDIRECT_URI.to_string()]),
    )
    .await
    .unwrap();
    let client_id = registration.client.client_id.clone();
    let client_secret = registration.client_secret.clone().unwrap();

    create_user(
        server.storage.users.as_ref(),
        NewUser {
            username: "alice".into(),
            email: Some("alice@example.com".into()),
            password: Some("wonderland".into()),
        },
    )
    .await
    .unwrap();

    // Anonymous authorize request is parked in a session and sent to login
    let authorize = Url::parse_with_params(
        &format!("{base}/oauth/authorize"),
        &[
            ("response_type", "code"),
            ("client_id", client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("scope", "openid email"),
            ("state", "st-1"),
        ],
    )
    .unwrap();
    let resp = client.get(authorize).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    let cookie = session_cookie(&resp).expect("pending session cookie");

    // Password login resumes the authorization request
    let resp = client
        .post(format!("{base}/login"))
        .header(COOKIE, &cookie)
        .form(&[("username", "alice"), ("password", "wonderland")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let resume = location(&resp);
    assert!(resume.starts_with("/oauth/authorize?"));
    let cookie = session_cookie(&resp).expect("signed-in session cookie");

    let resp = client
        .get(format!("{base}{resume}"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("Web App"));

    // Approve consent
    let resp = client
        .post(format!("{base}/oauth/authorize"))
        .header(COOKIE, &cookie)
        .form(&[
            ("client_id", client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("state", "st-1"),
            ("approved", "1"),
            ("scopes[]", "openid"),
            ("scopes[]", "email"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let callback = Url::parse(&location(&resp)).unwrap();
    assert!(callback.as_str().starts_with(REDIRECT_URI));
    let params: Vec<(String, String)> = callback.query_pairs().into_owned().collect();
    assert!(params.contains(&("state".into(), "st-1".into())));
    let code = params.iter().find(|(k, _)| k == "code").unwrap().1.clone();

    // Exchange the code with HTTP Basic client credentials
    let resp = client
        .post(format!("{base}/oauth/token"))
        .basic_auth(&client_id, Some(&client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    let tokens: Value = resp.json().await.unwrap();
    assert_eq!(tokens["token_type"], "Bearer");
    assert!(tokens["id_token"].is_string());
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // The code is single use
    let resp = client
        .post(format!("{base}/oauth/token"))
        .basic_auth(&client_id, Some(&client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"], "invalid_grant");

    let resp = client
        .get(format!("{base}/oauth/userinfo"))
        .bearer_auth(&access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info: Value = resp.json().await.unwrap();
    assert_eq!(info["email"], "alice@example.com");

    // Refresh rotates the token; the old one stops working
    let resp = client
        .post(format!("{base}/oauth/token"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = resp.json().await.unwrap();
    assert_ne!(rotated["refresh_token"].as_str().unwrap(), refresh_token);

    let resp = client
        .post(format!("{base}/oauth/token"))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn token_endpoint_rejects_unknown_client() {
    let server = start_server().await;
    let client = http_client();

    let resp = client
        .post(format!("{}/oauth/token", server.base))
        .basic_auth("nobody", Some("nothing"))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", "x"),
            ("redirect_uri", REDIRECT_URI),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"], "invalid_client");

    server.stop().await;
}
