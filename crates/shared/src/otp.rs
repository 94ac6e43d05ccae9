//! Time-based one-time passwords (RFC 6238) over HMAC-SHA1.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Length of a freshly generated shared secret in bytes.
pub const SECRET_LEN: usize = 20;

/// Error type for OTP secret handling.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Stored OTP secret is not valid base64")]
    MalformedSecret,

    #[error("OTP secret is empty")]
    EmptySecret,

    #[error("Failed to compute OTP: {0}")]
    Hmac(String),

    #[error("OTP secret could not be sealed or opened: {0}")]
    Sealed(#[from] crate::secret_box::SecretBoxError),
}

/// Generates a random shared secret of `len` bytes.
pub fn generate_secret(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    bytes
}

/// Encodes a secret for storage on the user record.
pub fn encode_secret(secret: &[u8]) -> String {
    STANDARD.encode(secret)
}

/// Decodes a stored secret.
pub fn decode_secret(encoded: &str) -> Result<Vec<u8>, OtpError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| OtpError::MalformedSecret)?;
    if bytes.is_empty() {
        return Err(OtpError::EmptySecret);
    }
    Ok(bytes)
}

/// TOTP parameters.
#[derive(Debug, Clone, Copy)]
pub struct Totp {
    /// Time step in seconds
    pub step_secs: u64,
    /// Number of digits in a code
    pub digits: u32,
    /// Steps accepted either side of the current one
    pub window: u64,
}

impl Default for Totp {
    fn default() -> Self {
        Self {
            step_secs: 30,
            digits: 6,
            window: 1,
        }
    }
}

impl Totp {
    /// Computes the code for the step containing `unix_secs`.
    pub fn generate_at(&self, secret: &[u8], unix_secs: u64) -> Result<String, OtpError> {
        self.code_for_counter(secret, unix_secs / self.step_secs)
    }

    /// Checks `code` against the steps within the verification window around `unix_secs`.
    pub fn verify_at(&self, secret: &[u8], code: &str, unix_secs: u64) -> Result<bool, OtpError> {
        let code = code.trim();
        if code.len() != self.digits as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let current = unix_secs / self.step_secs;
        let first = current.saturating_sub(self.window);
        let last = current.saturating_add(self.window);

        let mut matched = false;
        for counter in first..=last {
            let expected = self.code_for_counter(secret, counter)?;
            matched |= crate::crypto::constant_time_eq(expected.as_bytes(), code.as_bytes());
        }
        Ok(matched)
    }

    fn code_for_counter(&self, secret: &[u8], counter: u64) -> Result<String, OtpError> {
        let mut mac =
            HmacSha1::new_from_slice(secret).map_err(|e| OtpError::Hmac(e.to_string()))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = ((u32::from(digest[offset]) & 0x7f) << 24)
            | (u32::from(digest[offset + 1]) << 16)
            | (u32::from(digest[offset + 2]) << 8)
            | u32::from(digest[offset + 3]);

        let modulus = 10u32.pow(self.digits);
        Ok(format!(
            "{:0width$}",
            binary % modulus,
            width = self.digits as usize
        ))
    }
}
