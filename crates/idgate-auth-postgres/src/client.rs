//! OAuth client storage.
//!
//! Clients live in `auth_client`; `client_id` is unique.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use idgate_auth::storage::ClientStorage;
use idgate_auth::types::{Client, GrantType};
use idgate_auth::{AuthError, AuthResult};

use crate::{PostgresAuthStorage, StorageError, StorageResult, on_conflict};

// =============================================================================
// Types
// =============================================================================

type ClientTuple = (
    Uuid,
    String,
    Option<String>,
    String,
    Vec<String>,
    Vec<String>,
    Vec<String>,
    bool,
    bool,
    OffsetDateTime,
    OffsetDateTime,
);

const CLIENT_COLUMNS: &str = "id, client_id, client_secret_hash, name, redirect_uris, \
     grant_types, scopes, confidential, active, created_at, updated_at";

/// Client record from database.
#[derive(Debug, Clone)]
pub struct ClientRow {
    /// Internal identifier
    pub id: Uuid,
    /// Public client identifier
    pub client_id: String,
    /// Argon2id secret hash
    pub client_secret_hash: Option<String>,
    /// Display name
    pub name: String,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Grant type names
    pub grant_types: Vec<String>,
    /// Informational scopes
    pub scopes: Vec<String>,
    /// Whether the client holds a secret
    pub confidential: bool,
    /// Whether the client may be used
    pub active: bool,
    /// Created timestamp
    pub created_at: OffsetDateTime,
    /// Updated timestamp
    pub updated_at: OffsetDateTime,
}

impl ClientRow {
    /// Create from database tuple.
    fn from_tuple(row: ClientTuple) -> Self {
        Self {
            id: row.0,
            client_id: row.1,
            client_secret_hash: row.2,
            name: row.3,
            redirect_uris: row.4,
            grant_types: row.5,
            scopes: row.6,
            confidential: row.7,
            active: row.8,
            created_at: row.9,
            updated_at: row.10,
        }
    }

    /// Convert to the domain type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CorruptRow` for an unknown grant type name.
    pub fn into_client(self) -> StorageResult<Client> {
        let grant_types = self
            .grant_types
            .iter()
            .map(|g| g.parse::<GrantType>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                StorageError::corrupt_row(format!("client '{}': {}", self.client_id, e))
            })?;

        Ok(Client {
            id: self.id,
            client_id: self.client_id,
            client_secret_hash: self.client_secret_hash,
            name: self.name,
            redirect_uris: self.redirect_uris,
            grant_types,
            scopes: self.scopes,
            confidential: self.confidential,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// ClientStorage
// =============================================================================

#[async_trait]
impl ClientStorage for PostgresAuthStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        let row: Option<ClientTuple> = query_as(&format!(
            "SELECT {CLIENT_COLUMNS} FROM auth_client WHERE client_id = $1"
        ))
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(row
            .map(|row| ClientRow::from_tuple(row).into_client())
            .transpose()?)
    }

    async fn create(&self, client: &Client) -> AuthResult<()> {
        let grant_types: Vec<String> = client
            .grant_types
            .iter()
            .map(|g| g.as_str().to_string())
            .collect();

        query(
            r#"
            INSERT INTO auth_client (id, client_id, client_secret_hash, name, redirect_uris,
                                     grant_types, scopes, confidential, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(client.id)
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.redirect_uris)
        .bind(&grant_types)
        .bind(&client.scopes)
        .bind(client.confidential)
        .bind(client.active)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            on_conflict(e, |_| {
                AuthError::invalid_request(format!("Client '{}' already exists", client.client_id))
            })
        })?;

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<Client>> {
        let rows: Vec<ClientTuple> = query_as(&format!(
            "SELECT {CLIENT_COLUMNS} FROM auth_client ORDER BY created_at LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| ClientRow::from_tuple(row).into_client())
            .collect::<StorageResult<Vec<_>>>()?)
    }
}
