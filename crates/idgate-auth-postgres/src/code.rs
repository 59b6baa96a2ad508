//! Authorization code storage.
//!
//! Redemption is a single conditional `UPDATE`, so of two concurrent
//! exchanges of the same code exactly one sees a row affected.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::AuthorizationCodeStorage;
use idgate_auth::types::AuthorizationCode;
use idgate_auth::{AuthError, AuthResult};

use crate::{PostgresAuthStorage, StorageError, on_conflict};

type CodeTuple = (
    String,
    String,
    Uuid,
    String,
    Vec<String>,
    Option<String>,
    Option<String>,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

fn code_from_tuple(row: CodeTuple) -> AuthorizationCode {
    AuthorizationCode {
        code: row.0,
        client_id: row.1,
        user_id: row.2,
        redirect_uri: row.3,
        scopes: row.4,
        code_challenge: row.5,
        code_challenge_method: row.6,
        used: row.7,
        created_at: row.8,
        expires_at: row.9,
    }
}

#[async_trait]
impl AuthorizationCodeStorage for PostgresAuthStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        query(
            r#"
            INSERT INTO auth_authorization_code (code, client_id, user_id, redirect_uri, scopes,
                                                 code_challenge, code_challenge_method, used,
                                                 created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(&code.scopes)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(code.used)
        .bind(code.created_at)
        .bind(code.expires_at)
        .execute(self.pool())
        .await
        .map_err(|e| on_conflict(e, |_| AuthError::storage("Duplicate authorization code")))?;

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        let row: Option<CodeTuple> = query_as(
            r#"
            SELECT code, client_id, user_id, redirect_uri, scopes, code_challenge,
                   code_challenge_method, used, created_at, expires_at
            FROM auth_authorization_code
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row.map(code_from_tuple))
    }

    async fn mark_used(&self, code: &str) -> AuthResult<bool> {
        let result = query(
            r#"
            UPDATE auth_authorization_code
            SET used = TRUE
            WHERE code = $1
              AND used = FALSE
              AND expires_at > NOW()
            "#,
        )
        .bind(code)
        .execute(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let result = query("DELETE FROM auth_authorization_code WHERE expires_at <= NOW()")
            .execute(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}
