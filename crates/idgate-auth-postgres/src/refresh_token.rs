//! Refresh token storage.
//!
//! Only SHA-256 hashes are stored. Rotation revokes the old token and
//! inserts its replacement in one transaction.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::RefreshTokenStorage;
use idgate_auth::types::RefreshToken;
use idgate_auth::{AuthError, AuthResult};

use crate::{PostgresAuthStorage, StorageError, on_conflict};

type TokenTuple = (
    Uuid,
    String,
    String,
    Uuid,
    Vec<String>,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

const INSERT_TOKEN: &str = r#"
    INSERT INTO auth_refresh_token (id, token_hash, client_id, user_id, scopes, revoked,
                                    created_at, expires_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

const REVOKE_VALID: &str = r#"
    UPDATE auth_refresh_token
    SET revoked = TRUE
    WHERE token_hash = $1
      AND revoked = FALSE
      AND expires_at > NOW()
"#;

fn token_from_tuple(row: TokenTuple) -> RefreshToken {
    RefreshToken {
        id: row.0,
        token_hash: row.1,
        client_id: row.2,
        user_id: row.3,
        scopes: row.4,
        revoked: row.5,
        created_at: row.6,
        expires_at: row.7,
    }
}

fn duplicate_token(e: sqlx_core::Error) -> AuthError {
    on_conflict(e, |_| AuthError::storage("Duplicate refresh token"))
}

#[async_trait]
impl RefreshTokenStorage for PostgresAuthStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        query(INSERT_TOKEN)
            .bind(token.id)
            .bind(&token.token_hash)
            .bind(&token.client_id)
            .bind(token.user_id)
            .bind(&token.scopes)
            .bind(token.revoked)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(self.pool())
            .await
            .map_err(duplicate_token)?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        let row: Option<TokenTuple> = query_as(
            r#"
            SELECT id, token_hash, client_id, user_id, scopes, revoked, created_at, expires_at
            FROM auth_refresh_token
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row.map(token_from_tuple))
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let result = query(
            "UPDATE auth_refresh_token SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken) -> AuthResult<bool> {
        let mut tx = self.pool().begin().await.map_err(StorageError::from)?;

        let revoked = query(REVOKE_VALID)
            .bind(old_hash)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        if revoked.rows_affected() != 1 {
            tx.rollback().await.map_err(StorageError::from)?;
            return Ok(false);
        }

        query(INSERT_TOKEN)
            .bind(replacement.id)
            .bind(&replacement.token_hash)
            .bind(&replacement.client_id)
            .bind(replacement.user_id)
            .bind(&replacement.scopes)
            .bind(replacement.revoked)
            .bind(replacement.created_at)
            .bind(replacement.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(duplicate_token)?;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(true)
    }

    async fn revoke_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let result = query(
            "UPDATE auth_refresh_token SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(StorageError::from)?;

        tracing::debug!(user_id = %user_id, count = result.rows_affected(), "Revoked refresh tokens");
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let result = query("DELETE FROM auth_refresh_token WHERE expires_at <= NOW()")
            .execute(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}
