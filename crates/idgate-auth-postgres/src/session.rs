//! Browser session storage.
//!
//! The session is stored whole as JSONB next to the columns needed for
//! lookup and expiry.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use idgate_auth::AuthResult;
use idgate_auth::oauth::BrowserSession;
use idgate_auth::storage::BrowserSessionStorage;

use crate::{PostgresAuthStorage, StorageError};

#[async_trait]
impl BrowserSessionStorage for PostgresAuthStorage {
    async fn save(&self, session: &BrowserSession) -> AuthResult<()> {
        let data = serde_json::to_value(session).map_err(StorageError::from)?;

        query(
            r#"
            INSERT INTO auth_browser_session (id, user_id, data, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                data = EXCLUDED.data,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&data)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }

    async fn find(&self, id: &str) -> AuthResult<Option<BrowserSession>> {
        let row: Option<(serde_json::Value,)> = query_as(
            "SELECT data FROM auth_browser_session WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row
            .map(|(data,)| serde_json::from_value(data))
            .transpose()
            .map_err(StorageError::from)?)
    }

    async fn delete(&self, id: &str) -> AuthResult<()> {
        query("DELETE FROM auth_browser_session WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let result = query("DELETE FROM auth_browser_session WHERE expires_at <= NOW()")
            .execute(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}
