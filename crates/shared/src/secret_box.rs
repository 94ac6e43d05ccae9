//! Authenticated encryption for secrets stored at rest.
//!
//! Values are sealed with AES-256-GCM under a random 96-bit nonce and stored
//! as base64 of `nonce || ciphertext`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SecretBoxError {
    #[error("Encryption key must be {KEY_LEN} bytes, base64-encoded")]
    InvalidKey,

    #[error("Sealed value is malformed")]
    Malformed,

    #[error("Sealed value failed authentication")]
    Tampered,

    #[error("Encryption failed")]
    Seal,
}

/// Seals and opens values under one key.
#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

impl SecretBox {
    pub fn from_base64_key(encoded: &str) -> Result<Self, SecretBoxError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SecretBoxError::InvalidKey)?;
        if key.len() != KEY_LEN {
            return Err(SecretBoxError::InvalidKey);
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, SecretBoxError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| SecretBoxError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<Vec<u8>, SecretBoxError> {
        let bytes = STANDARD
            .decode(sealed.trim())
            .map_err(|_| SecretBoxError::Malformed)?;
        if bytes.len() <= NONCE_LEN {
            return Err(SecretBoxError::Malformed);
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretBoxError::Tampered)
    }
}
