//! Local credential storage strategies.
//!
//! A strategy turns a supplied password into its stored form (`protect`) and
//! checks a supplied password against a stored form (`verify`). `verify`
//! never fails: a malformed stored value is simply not a match, so a corrupt
//! record degrades to a failed login instead of an error page.
//!
//! Exactly one strategy is active per deployment; which one is a startup
//! decision, not a per-request one.

use super::error::AuthError;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

const AES_GCM_NONCE_SIZE: usize = 12;

pub trait CredentialStrategy: Send + Sync {
    /// Stable name used in logs and startup output.
    fn name(&self) -> &'static str;

    /// Convert a supplied password into its stored form.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal faults (hashing or encryption
    /// failure), never on properties of the password itself.
    fn protect(&self, supplied: &str) -> Result<String, AuthError>;

    /// Check a supplied password against a stored form.
    fn verify(&self, stored: &str, supplied: &str) -> bool;
}

/// Stores the raw password and compares it with `==`.
///
/// Insecure by design: this models legacy deployments that never hashed.
/// It exists so those deployments can be reproduced exactly, not fixed
/// silently.
#[derive(Clone, Copy, Debug)]
pub struct PlaintextStrategy;

impl CredentialStrategy for PlaintextStrategy {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn protect(&self, supplied: &str) -> Result<String, AuthError> {
        Ok(supplied.to_string())
    }

    fn verify(&self, stored: &str, supplied: &str) -> bool {
        stored == supplied
    }
}

/// Argon2id with a fresh random salt per record.
///
/// The stored PHC string carries the salt and the work-factor parameters, so
/// verification always uses whatever parameters the record was written with.
#[derive(Clone, Default)]
pub struct HashedStrategy {
    argon2: Argon2<'static>,
}

impl HashedStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStrategy for HashedStrategy {
    fn name(&self) -> &'static str {
        "hashed"
    }

    fn protect(&self, supplied: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(supplied.as_bytes(), &salt)
            .map_err(|err| {
                AuthError::StoreUnavailable(anyhow!("failed to hash credential: {err}"))
            })?;
        Ok(hash.to_string())
    }

    fn verify(&self, stored: &str, supplied: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        // Comparison inside verify_password is constant-time.
        self.argon2
            .verify_password(supplied.as_bytes(), &parsed)
            .is_ok()
    }
}

/// AES-256-GCM under a single process-wide key.
///
/// Reversible on purpose: this models legacy deployments that "encrypted"
/// passwords instead of hashing them. One leaked key exposes every record.
#[derive(Clone)]
pub struct EncryptedStrategy {
    key: [u8; 32],
}

impl EncryptedStrategy {
    #[must_use]
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build a strategy from a 64-hex-char key string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim()).map_err(|err| anyhow!("invalid hex key: {err}"))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| anyhow!("key must be 32 bytes, got {}", bytes.len()))?;
        Ok(Self::new(key))
    }

    /// Encrypt a password into base64(nonce ‖ ciphertext).
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|err| anyhow!("failed to create cipher: {err}"))?;

        let mut nonce_bytes = [0u8; AES_GCM_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|err| anyhow!("encryption failed: {err}"))?;

        let mut combined = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(&combined))
    }

    /// Decrypt a stored value back to the password. `None` for anything that
    /// is not well-formed output of [`Self::encrypt`] under this key.
    pub fn decrypt(&self, stored: &str) -> Option<String> {
        let combined = STANDARD.decode(stored.as_bytes()).ok()?;
        if combined.len() <= AES_GCM_NONCE_SIZE {
            return None;
        }
        let (nonce_bytes, ciphertext) = combined.split_at(AES_GCM_NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl CredentialStrategy for EncryptedStrategy {
    fn name(&self) -> &'static str {
        "encrypted"
    }

    fn protect(&self, supplied: &str) -> Result<String, AuthError> {
        self.encrypt(supplied).map_err(AuthError::StoreUnavailable)
    }

    fn verify(&self, stored: &str, supplied: &str) -> bool {
        self.decrypt(stored)
            .is_some_and(|plaintext| plaintext == supplied)
    }
}
