use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use idgate_auth::social::provider::DEFAULT_PROVIDER_TIMEOUT;
use idgate_auth::{
    AuthState, AuthStorage, SigningSecret, SocialProviderRegistry, TokenCipher, TokenCodec,
};
use idgate_auth_postgres::PostgresAuthStorage;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, StorageBackend};

/// Builds the full application router: auth routes, health check and the
/// middleware stack.
pub fn build_app(state: AuthState, body_limit: usize) -> Router {
    idgate_auth::router(state)
        .route("/healthz", get(healthz))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Opens the configured storage backend.
///
/// # Errors
///
/// Returns an error if the database cannot be reached or migrated.
pub async fn open_storage(cfg: &AppConfig) -> anyhow::Result<AuthStorage> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on restart");
            Ok(AuthStorage::memory())
        }
        StorageBackend::Postgres => {
            let pg = PostgresAuthStorage::connect(&cfg.storage.postgres).await?;
            tracing::info!(url = %cfg.storage.postgres.masked_url(), "Connected to PostgreSQL");
            Ok(AuthStorage::from_backend(Arc::new(pg)))
        }
    }
}

/// Wires the auth engine over `storage`.
///
/// # Errors
///
/// Returns an error if a secret, key or provider setting is unusable.
pub fn build_state(cfg: &AppConfig, storage: AuthStorage) -> anyhow::Result<AuthState> {
    let auth = &cfg.auth;

    let secret = SigningSecret::resolve(auth.signing.secret.as_deref())?;
    let codec = Arc::new(TokenCodec::new(&secret, auth.issuer()));
    let cipher = Arc::new(TokenCipher::resolve(
        auth.encryption.key.as_deref(),
        secret.expose(),
    )?);
    let providers = SocialProviderRegistry::from_config(&auth.social, DEFAULT_PROVIDER_TIMEOUT)?;

    Ok(AuthState::new(auth, storage, codec, cipher, providers))
}

/// Spawns the periodic purge of expired records, if an interval is set.
pub fn spawn_cleanup(cfg: &AppConfig, storage: AuthStorage) -> Option<JoinHandle<()>> {
    let period = cfg.auth.cleanup_interval?;
    if period.is_zero() {
        return None;
    }

    tracing::info!(interval = ?period, "Expired record cleanup enabled");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = storage.purge_expired().await {
                tracing::warn!(error = %e, "Cleanup of expired records failed");
            }
        }
    }))
}

pub struct IdgateServer {
    addr: SocketAddr,
    app: Router,
    cleanup: Option<JoinHandle<()>>,
}

impl IdgateServer {
    /// Opens storage and builds the application from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or the auth engine cannot be set up.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let storage = open_storage(cfg).await?;
        let state = build_state(cfg, storage.clone())?;
        let cleanup = spawn_cleanup(cfg, storage);

        Ok(Self {
            addr: cfg.addr(),
            app: build_app(state, cfg.server.body_limit_bytes),
            cleanup,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(cleanup) = self.cleanup {
            cleanup.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
