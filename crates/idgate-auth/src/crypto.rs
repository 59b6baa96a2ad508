//! Cryptographic helpers: random identifiers, credential hashing, and
//! encryption of provider tokens at rest.
//!
//! # Security
//!
//! - Codes, refresh tokens and client secrets are 256-bit random values, hex encoded
//! - Passwords and client secrets are hashed with Argon2id (PHC string format)
//! - Provider tokens are sealed with AES-256-GCM under a 96-bit random nonce

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
pub const KEY_SIZE: usize = 32;

/// Environment variable holding the provider token encryption key.
pub const TOKEN_KEY_ENV: &str = "IDGATE_TOKEN_KEY";

/// Errors raised by hashing and sealing operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Hashing a credential failed.
    #[error("Hashing failed: {0}")]
    Hash(String),

    /// A stored hash is not a valid PHC string.
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    /// Encrypting or decrypting a sealed value failed.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An encryption key could not be parsed.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
}

impl From<CryptoError> for crate::AuthError {
    fn from(err: CryptoError) -> Self {
        crate::AuthError::internal(err.to_string())
    }
}

// =============================================================================
// Random values
// =============================================================================

/// Generates `len` random bytes from the thread RNG and hex encodes them.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a 256-bit opaque token (64 hex characters).
///
/// Used for authorization codes, refresh tokens and client secrets.
#[must_use]
pub fn generate_token() -> String {
    random_hex(32)
}

/// SHA-256 digest of `value`, hex encoded.
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// Credential hashing
// =============================================================================

/// Hash a password or client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `CryptoError::Hash` if hashing fails (rare).
pub fn hash_secret(secret: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::Hash(e.to_string()))
}

/// Verify a password or client secret against a stored Argon2 hash.
///
/// Comparison is delegated to Argon2's own verifier, which is constant time.
///
/// # Returns
///
/// `Ok(true)` if the secret matches, `Ok(false)` if it doesn't.
///
/// # Errors
///
/// Returns `CryptoError::MalformedHash` only if the stored hash cannot be parsed.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(hash).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

// =============================================================================
// Token sealing
// =============================================================================

/// A provider token encrypted at rest.
///
/// Only [`TokenCipher::open`] turns it back into plaintext; `Debug` never
/// prints the ciphertext.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedToken {
    /// Base64-encoded ciphertext (includes the GCM tag).
    pub ciphertext: String,
    /// Base64-encoded nonce.
    pub nonce: String,
}

impl SealedToken {
    /// Encodes as `nonce.ciphertext` for storage in a single text column.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        format!("{}.{}", self.nonce, self.ciphertext)
    }

    /// Parses the `nonce.ciphertext` storage form.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the value has no separator.
    pub fn from_storage_string(value: &str) -> Result<Self, CryptoError> {
        let (nonce, ciphertext) = value
            .split_once('.')
            .ok_or_else(|| CryptoError::Encryption("Malformed sealed token".to_string()))?;
        Ok(Self {
            ciphertext: ciphertext.to_string(),
            nonce: nonce.to_string(),
        })
    }
}

impl std::fmt::Debug for SealedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealedToken(<redacted>)")
    }
}

/// AES-256-GCM cipher for provider access and refresh tokens.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl TokenCipher {
    /// Creates a cipher from a raw key.
    #[must_use]
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Parses a key from a hex (64 chars) or base64 string.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the string does not decode to 32 bytes.
    pub fn from_encoded_key(key_str: &str) -> Result<Self, CryptoError> {
        let key_str = key_str.trim();
        let bytes = if key_str.len() == KEY_SIZE * 2 {
            hex::decode(key_str).map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        } else {
            BASE64
                .decode(key_str)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        };

        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::InvalidKey(format!("Key must be {} bytes, got {}", KEY_SIZE, b.len()))
        })?;
        Ok(Self::new(key))
    }

    /// Resolves the key from `IDGATE_TOKEN_KEY`, then `configured`, and
    /// otherwise derives it from `fallback_secret`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if a supplied key does not decode.
    pub fn resolve(configured: Option<&str>, fallback_secret: &str) -> Result<Self, CryptoError> {
        let from_env = std::env::var(TOKEN_KEY_ENV).ok();
        Self::resolve_from(from_env.as_deref(), configured, fallback_secret)
    }

    /// Resolution logic of [`TokenCipher::resolve`] with the environment
    /// value passed in.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if a supplied key does not decode.
    pub fn resolve_from(
        from_env: Option<&str>,
        configured: Option<&str>,
        fallback_secret: &str,
    ) -> Result<Self, CryptoError> {
        match from_env
            .filter(|k| !k.is_empty())
            .or_else(|| configured.filter(|k| !k.is_empty()))
        {
            Some(key) => Self::from_encoded_key(key),
            None => {
                tracing::debug!("Deriving token encryption key from the signing secret");
                Ok(Self::derive_from(fallback_secret))
            }
        }
    }

    /// Derives a key from another secret with SHA-256.
    #[must_use]
    pub fn derive_from(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"idgate-token-encryption:");
        hasher.update(secret.as_bytes());
        Self::new(hasher.finalize().into())
    }

    /// Encrypts a plaintext token.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the cipher fails.
    pub fn seal(&self, plaintext: &str) -> Result<SealedToken, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(format!("Failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("Encryption failed: {e}")))?;

        Ok(SealedToken {
            ciphertext: BASE64.encode(&ciphertext),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    /// Decrypts a sealed token.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the value is malformed, was sealed
    /// under another key, or was tampered with.
    pub fn open(&self, sealed: &SealedToken) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::Encryption(format!("Failed to create cipher: {e}")))?;

        let ciphertext = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|e| CryptoError::Encryption(format!("Invalid ciphertext base64: {e}")))?;
        let nonce_bytes = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| CryptoError::Encryption(format!("Invalid nonce base64: {e}")))?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::Encryption("Invalid nonce size".to_string()));
        }

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| CryptoError::Encryption(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::Encryption(format!("Invalid UTF-8 in decrypted value: {e}")))
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_and_verify_secret() {
        let hash = hash_secret("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("correct horse", &hash).unwrap());
        assert!(!verify_secret("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_same_secret_different_hashes() {
        let hash1 = hash_secret("secret").unwrap();
        let hash2 = hash_secret("secret").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_malformed_hash() {
        let result = verify_secret("secret", "not-a-phc-string");
        assert!(matches!(result, Err(CryptoError::MalformedHash(_))));
    }

    #[test]
    fn test_seal_open() {
        let cipher = TokenCipher::new([7u8; KEY_SIZE]);
        let sealed = cipher.seal("ya29.provider-access-token").unwrap();
        assert_ne!(sealed.ciphertext, "ya29.provider-access-token");
        assert_eq!(cipher.open(&sealed).unwrap(), "ya29.provider-access-token");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = TokenCipher::new([1u8; KEY_SIZE]).seal("token").unwrap();
        assert!(TokenCipher::new([2u8; KEY_SIZE]).open(&sealed).is_err());
    }

    #[test]
    fn test_storage_string_roundtrip() {
        let cipher = TokenCipher::derive_from("signing-secret");
        let sealed = cipher.seal("gho_abc").unwrap();
        let parsed = SealedToken::from_storage_string(&sealed.to_storage_string()).unwrap();
        assert_eq!(cipher.open(&parsed).unwrap(), "gho_abc");
        assert!(SealedToken::from_storage_string("no-separator").is_err());
    }

    #[test]
    fn test_from_encoded_key() {
        let hex_key = "11".repeat(KEY_SIZE);
        assert!(TokenCipher::from_encoded_key(&hex_key).is_ok());

        let b64_key = BASE64.encode([3u8; KEY_SIZE]);
        assert!(TokenCipher::from_encoded_key(&b64_key).is_ok());

        let short = BASE64.encode([3u8; 8]);
        assert!(matches!(
            TokenCipher::from_encoded_key(&short),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resolve_prefers_environment() {
        let env_key = "22".repeat(KEY_SIZE);
        let config_key = "33".repeat(KEY_SIZE);

        let sealed = TokenCipher::new([0x22; KEY_SIZE]).seal("t").unwrap();
        let cipher = TokenCipher::resolve_from(Some(&env_key), Some(&config_key), "s").unwrap();
        assert_eq!(cipher.open(&sealed).unwrap(), "t");

        let sealed = TokenCipher::new([0x33; KEY_SIZE]).seal("t").unwrap();
        let cipher = TokenCipher::resolve_from(Some(""), Some(&config_key), "s").unwrap();
        assert_eq!(cipher.open(&sealed).unwrap(), "t");

        let sealed = TokenCipher::derive_from("s").seal("t").unwrap();
        let cipher = TokenCipher::resolve_from(None, None, "s").unwrap();
        assert_eq!(cipher.open(&sealed).unwrap(), "t");

        assert!(TokenCipher::resolve_from(None, Some("bad"), "s").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let sealed = TokenCipher::new([0u8; KEY_SIZE]).seal("secret").unwrap();
        assert_eq!(format!("{:?}", sealed), "SealedToken(<redacted>)");
    }
}
