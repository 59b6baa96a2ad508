//! Client registration and user provisioning.
//!
//! Used by the admin CLI. Identifiers and secrets are always generated here;
//! plaintext secrets and passwords are hashed before they reach storage.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::crypto::{generate_token, hash_secret, random_hex};
use crate::storage::{ClientStorage, RefreshTokenStorage, UserStorage};
use crate::types::{Client, ClientRegistration, ClientRegistrationRequest, NewUser, User};
use crate::{AuthError, AuthResult};

/// Registers a new client.
///
/// Confidential clients get a generated secret, returned once in
/// [`ClientRegistration::client_secret`].
///
/// # Errors
///
/// Returns `AuthError::InvalidRequest` if the resulting client is invalid,
/// or a storage error.
pub async fn register_client(
    clients: &dyn ClientStorage,
    request: ClientRegistrationRequest,
) -> AuthResult<ClientRegistration> {
    let client_secret = request.confidential.then(generate_token);
    let client_secret_hash = client_secret
        .as_deref()
        .map(hash_secret)
        .transpose()?;

    let now = OffsetDateTime::now_utc();
    let client = Client {
        id: Uuid::new_v4(),
        client_id: random_hex(16),
        client_secret_hash,
        name: request.name,
        redirect_uris: request.redirect_uris,
        grant_types: request.grant_types,
        scopes: request.scopes,
        confidential: request.confidential,
        active: request.active,
        created_at: now,
        updated_at: now,
    };

    client
        .validate()
        .map_err(|e| AuthError::invalid_request(e.to_string()))?;
    clients.create(&client).await?;

    tracing::info!(client_id = %client.client_id, confidential = client.confidential, "Client registered");
    Ok(ClientRegistration {
        client,
        client_secret,
    })
}

/// Creates a user, hashing the password if one is given.
///
/// # Errors
///
/// Returns `AuthError::InvalidRequest` for invalid input,
/// `AuthError::UsernameTaken` for a taken username, or a storage error.
pub async fn create_user(users: &dyn UserStorage, new_user: NewUser) -> AuthResult<User> {
    new_user.validate().map_err(AuthError::invalid_request)?;

    let username = new_user.username.trim().to_string();
    if users.username_exists(&username).await? {
        return Err(AuthError::username_taken(username));
    }

    let mut user = User::new(username);
    if let Some(email) = new_user.email {
        user = user.with_email(email);
    }
    if let Some(password) = new_user.password.as_deref() {
        user = user.with_password_hash(hash_secret(password)?);
    }

    users.create(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User created");
    Ok(user)
}

/// Disables a user and revokes their refresh tokens.
///
/// Access tokens already issued stay valid until they expire, but UserInfo
/// rejects them once the account is inactive. Returns the number of refresh
/// tokens revoked.
///
/// # Errors
///
/// Returns `AuthError::InvalidRequest` for an unknown username, or a
/// storage error.
pub async fn disable_user(
    users: &dyn UserStorage,
    refresh_tokens: &dyn RefreshTokenStorage,
    username: &str,
) -> AuthResult<u64> {
    let user = users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AuthError::invalid_request(format!("User not found: {username}")))?;

    users.set_active(user.id, false).await?;
    let revoked = refresh_tokens.revoke_by_user(user.id).await?;

    tracing::info!(user_id = %user.id, revoked, "User disabled");
    Ok(revoked)
}
