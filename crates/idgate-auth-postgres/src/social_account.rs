//! Social account storage.
//!
//! `(provider, provider_user_id)` is unique. Provider tokens are stored in
//! their sealed text form and never decrypted here.

use async_trait::async_trait;
use sqlx_core::query::{Query, query};
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgArguments, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::crypto::SealedToken;
use idgate_auth::storage::SocialAccountStorage;
use idgate_auth::types::{SocialAccount, User};
use idgate_auth::{AuthError, AuthResult};

use crate::user::{insert_user, user_conflict};
use crate::{PostgresAuthStorage, StorageError, StorageResult, on_conflict};

type AccountTuple = (
    Uuid,
    Uuid,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<OffsetDateTime>,
    serde_json::Value,
    OffsetDateTime,
    OffsetDateTime,
);

const ACCOUNT_COLUMNS: &str = "id, user_id, provider, provider_user_id, email, name, avatar_url, \
     access_token, refresh_token, expires_at, raw_profile, created_at, updated_at";

fn unseal(value: Option<String>, account_id: Uuid) -> StorageResult<Option<SealedToken>> {
    value
        .map(|v| SealedToken::from_storage_string(&v))
        .transpose()
        .map_err(|e| StorageError::corrupt_row(format!("social account {account_id}: {e}")))
}

fn account_from_tuple(row: AccountTuple) -> StorageResult<SocialAccount> {
    Ok(SocialAccount {
        id: row.0,
        user_id: row.1,
        provider: row.2,
        provider_user_id: row.3,
        email: row.4,
        name: row.5,
        avatar_url: row.6,
        access_token: unseal(row.7, row.0)?,
        refresh_token: unseal(row.8, row.0)?,
        expires_at: row.9,
        raw_profile: row.10,
        created_at: row.11,
        updated_at: row.12,
    })
}

fn seal(token: Option<&SealedToken>) -> Option<String> {
    token.map(SealedToken::to_storage_string)
}

fn insert_account(account: &SocialAccount) -> Query<'_, Postgres, PgArguments> {
    query(
        r#"
        INSERT INTO auth_social_account (id, user_id, provider, provider_user_id, email, name,
                                         avatar_url, access_token, refresh_token, expires_at,
                                         raw_profile, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(account.id)
    .bind(account.user_id)
    .bind(&account.provider)
    .bind(&account.provider_user_id)
    .bind(&account.email)
    .bind(&account.name)
    .bind(&account.avatar_url)
    .bind(seal(account.access_token.as_ref()))
    .bind(seal(account.refresh_token.as_ref()))
    .bind(account.expires_at)
    .bind(&account.raw_profile)
    .bind(account.created_at)
    .bind(account.updated_at)
}

fn link_conflict(e: sqlx_core::Error, account: &SocialAccount) -> AuthError {
    on_conflict(e, |_| AuthError::account_already_linked(&account.provider))
}

#[async_trait]
impl SocialAccountStorage for PostgresAuthStorage {
    async fn find_by_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> AuthResult<Option<SocialAccount>> {
        let row: Option<AccountTuple> = query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM auth_social_account \
             WHERE provider = $1 AND provider_user_id = $2"
        ))
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row.map(account_from_tuple).transpose()?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> AuthResult<Vec<SocialAccount>> {
        let rows: Vec<AccountTuple> = query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM auth_social_account \
             WHERE user_id = $1 ORDER BY provider"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(account_from_tuple)
            .collect::<StorageResult<Vec<_>>>()?)
    }

    async fn create(&self, account: &SocialAccount) -> AuthResult<()> {
        insert_account(account)
            .execute(self.pool())
            .await
            .map_err(|e| link_conflict(e, account))?;

        Ok(())
    }

    async fn create_with_user(&self, user: &User, account: &SocialAccount) -> AuthResult<()> {
        let mut tx = self.pool().begin().await.map_err(StorageError::from)?;

        // A failed statement aborts the transaction; dropping `tx` rolls back.
        insert_user(user)
            .execute(&mut *tx)
            .await
            .map_err(|e| user_conflict(e, user))?;
        insert_account(account)
            .execute(&mut *tx)
            .await
            .map_err(|e| link_conflict(e, account))?;

        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }

    async fn update(&self, account: &SocialAccount) -> AuthResult<()> {
        let result = query(
            r#"
            UPDATE auth_social_account
            SET email = $2,
                name = $3,
                avatar_url = $4,
                access_token = $5,
                refresh_token = $6,
                expires_at = $7,
                raw_profile = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(seal(account.access_token.as_ref()))
        .bind(seal(account.refresh_token.as_ref()))
        .bind(account.expires_at)
        .bind(&account.raw_profile)
        .bind(account.updated_at)
        .execute(self.pool())
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::storage(format!(
                "Social account {} not found",
                account.id
            )));
        }
        Ok(())
    }
}
