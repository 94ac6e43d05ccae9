//! One-time codes for e-mail verification.
//!
//! Secrets are 20 random bytes. With `otp.secret_key` set they are sealed
//! with AES-256-GCM before being stored on the user record; otherwise they
//! are stored base64-encoded. Codes are RFC 6238 TOTP values sent by e-mail.

use chrono::Utc;
use shared::otp::{decode_secret, encode_secret, generate_secret, OtpError, Totp, SECRET_LEN};
use shared::secret_box::SecretBox;
use thiserror::Error;

use crate::config::OtpConfig;
use crate::services::email::{EmailError, EmailService};

/// Failure to deliver a code.
#[derive(Debug, Error)]
pub enum OtpDeliveryError {
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),
}

#[derive(Clone)]
pub struct OtpService {
    totp: Totp,
    email: EmailService,
    sealer: Option<SecretBox>,
}

impl OtpService {
    pub fn new(config: &OtpConfig, email: EmailService) -> Self {
        Self {
            totp: Totp {
                step_secs: config.step_secs,
                digits: config.digits,
                window: config.window,
            },
            email,
            sealer: None,
        }
    }

    /// Seal stored secrets under `sealer`.
    pub fn with_sealer(mut self, sealer: SecretBox) -> Self {
        self.sealer = Some(sealer);
        self
    }

    /// Fresh shared secret in its stored form.
    pub fn generate_secret(&self) -> Result<String, OtpError> {
        let secret = generate_secret(SECRET_LEN);
        match &self.sealer {
            Some(sealer) => Ok(sealer.seal(&secret)?),
            None => Ok(encode_secret(&secret)),
        }
    }

    /// Code for the current time step.
    pub fn current_code(&self, stored_secret: &str) -> Result<String, OtpError> {
        let secret = self.open(stored_secret)?;
        self.totp.generate_at(&secret, now_secs())
    }

    /// Whether `code` matches the current step or one inside the window.
    pub fn validate(&self, stored_secret: &str, code: &str) -> Result<bool, OtpError> {
        let secret = self.open(stored_secret)?;
        self.totp.verify_at(&secret, code, now_secs())
    }

    fn open(&self, stored_secret: &str) -> Result<Vec<u8>, OtpError> {
        match &self.sealer {
            Some(sealer) => Ok(sealer.open(stored_secret)?),
            None => decode_secret(stored_secret),
        }
    }

    /// E-mail the current code to `email`.
    pub async fn send_otp_email(
        &self,
        email: &str,
        stored_secret: &str,
    ) -> Result<(), OtpDeliveryError> {
        let code = self.current_code(stored_secret)?;
        self.email
            .send_otp_email(email, &code, self.totp.step_secs)
            .await?;
        tracing::info!(email = %email, "OTP email dispatched");
        Ok(())
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
