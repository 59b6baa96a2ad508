//! Embedded schema migrations.
//!
//! Migrations are compiled into the binary and tracked in the
//! `_sqlx_migrations` table. To add one, create the SQL file under
//! `migrations/` and append it to [`EMBEDDED_MIGRATIONS`].

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};

use crate::{PgPool, StorageResult};

/// `(version, description, sql)` in application order.
const EMBEDDED_MIGRATIONS: &[(i64, &str, &str)] = &[(
    20260101000001,
    "auth_schema",
    include_str!("../migrations/20260101000001_auth_schema.sql"),
)];

fn build_migrations() -> Vec<Migration> {
    EMBEDDED_MIGRATIONS
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Applies all pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
pub async fn run(pool: &PgPool) -> StorageResult<()> {
    let migrations = build_migrations();
    tracing::info!(count = migrations.len(), "Running auth schema migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };
    migrator.run(pool).await?;

    tracing::info!("Auth schema migrations completed");
    Ok(())
}
