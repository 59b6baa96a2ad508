//! User storage.
//!
//! Usernames are unique; emails are unique when present.

use async_trait::async_trait;
use sqlx_core::query::{Query, query};
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgArguments, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::UserStorage;
use idgate_auth::types::User;
use idgate_auth::{AuthError, AuthResult};

use crate::{PostgresAuthStorage, StorageError, on_conflict};

type UserTuple = (
    Uuid,
    String,
    Option<String>,
    Option<String>,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

const USER_COLUMNS: &str = "id, username, email, password_hash, active, created_at, updated_at";

/// Binds an `INSERT` of `user`; shared with the social sign-up transaction.
pub(crate) fn insert_user(user: &User) -> Query<'_, Postgres, PgArguments> {
    query(
        r#"
        INSERT INTO auth_user (id, username, email, password_hash, active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.active)
    .bind(user.created_at)
    .bind(user.updated_at)
}

pub(crate) fn user_conflict(e: sqlx_core::Error, user: &User) -> AuthError {
    on_conflict(e, |constraint| match constraint {
        Some("auth_user_email_key") => AuthError::invalid_request("Email already registered"),
        _ => AuthError::username_taken(&user.username),
    })
}

fn user_from_tuple(row: UserTuple) -> User {
    User {
        id: row.0,
        username: row.1,
        email: row.2,
        password_hash: row.3,
        active: row.4,
        created_at: row.5,
        updated_at: row.6,
    }
}

#[async_trait]
impl UserStorage for PostgresAuthStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let row: Option<UserTuple> =
            query_as(&format!("SELECT {USER_COLUMNS} FROM auth_user WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(StorageError::from)?;

        Ok(row.map(user_from_tuple))
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let row: Option<UserTuple> = query_as(&format!(
            "SELECT {USER_COLUMNS} FROM auth_user WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row.map(user_from_tuple))
    }

    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        let (exists,): (bool,) =
            query_as("SELECT EXISTS (SELECT 1 FROM auth_user WHERE username = $1)")
                .bind(username)
                .fetch_one(self.pool())
                .await
                .map_err(StorageError::from)?;

        Ok(exists)
    }

    async fn create(&self, user: &User) -> AuthResult<()> {
        insert_user(user)
            .execute(self.pool())
            .await
            .map_err(|e| user_conflict(e, user))?;

        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AuthResult<bool> {
        let result = query("UPDATE auth_user SET active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool())
            .await
            .map_err(StorageError::from)?;

        Ok(result.rows_affected() == 1)
    }
}
