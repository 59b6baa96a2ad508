//! PostgreSQL storage backend for idgate-auth
//!
//! Provides persistent storage for:
//!
//! - OAuth clients
//! - Users and linked social accounts
//! - Authorization codes
//! - Refresh tokens (hashes only)
//! - Browser sessions
//!
//! The schema is embedded in the binary and applied on connect when
//! [`PostgresConfig::run_migrations`] is set.
//!
//! # Example
//!
//! ```ignore
//! use idgate_auth::AuthStorage;
//! use idgate_auth_postgres::{PostgresAuthStorage, PostgresConfig};
//!
//! let backend = PostgresAuthStorage::connect(&PostgresConfig::new("postgres://localhost/idgate")).await?;
//! let storage = AuthStorage::from_backend(std::sync::Arc::new(backend));
//! ```

pub mod client;
pub mod code;
pub mod config;
pub mod migrations;
pub mod refresh_token;
pub mod session;
pub mod social_account;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use idgate_auth::AuthError;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;

pub use config::PostgresConfig;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx_core::migrate::MigrateError),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row cannot be mapped back to its domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl StorageError {
    /// Create a `CorruptRow` error.
    #[must_use]
    pub fn corrupt_row(message: impl Into<String>) -> Self {
        Self::CorruptRow(message.into())
    }

    /// Returns `true` if this is a unique constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx_core::Error::Database(e)) if e.is_unique_violation())
    }

    /// Name of the violated constraint, if the database reported one.
    #[must_use]
    pub fn constraint(&self) -> Option<&str> {
        match self {
            Self::Database(sqlx_core::Error::Database(e)) => e.constraint(),
            _ => None,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::storage(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for authentication data.
///
/// Implements every storage trait of `idgate-auth`; wrap it with
/// `AuthStorage::from_backend`.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    ///
    /// Migrations are not run.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or a migration fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StorageError> {
        tracing::info!(
            url = %config.masked_url(),
            pool_size = config.pool_size,
            "Connecting to PostgreSQL"
        );

        let pool = PoolOptions::<Postgres>::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect(&config.url)
            .await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps a unique violation to `conflict`, anything else to a storage error.
pub(crate) fn on_conflict(
    e: sqlx_core::Error,
    conflict: impl FnOnce(Option<&str>) -> AuthError,
) -> AuthError {
    let e = StorageError::from(e);
    if e.is_unique_violation() {
        conflict(e.constraint())
    } else {
        e.into()
    }
}

// =============================================================================
// Tests
// =============================================================================
