//! JWT token utilities using the HS256 algorithm.
//!
//! Access tokens are signed with a shared symmetric key and carry the
//! issuer and audience the API was configured with. Validation rejects
//! tokens whose issuer, audience, signature or expiry do not match.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Minimum length of the signing secret in bytes (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user e-mail)
    pub sub: String,
    /// JWT ID
    pub jti: String,
    /// User e-mail
    pub email: String,
    /// Whether the e-mail address has been verified by OTP
    pub email_verified: bool,
    /// User ID
    pub uid: String,
    /// Roles granted to the user
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// The identity a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub email_verified: bool,
    pub roles: &'a [String],
}

/// Configuration for JWT token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pub issuer: String,
    pub audience: String,
    /// Token lifetime in minutes
    pub expiry_minutes: i64,
    /// Leeway in seconds for clock skew tolerance
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_minutes", &self.expiry_minutes)
            .field("leeway_secs", &self.leeway_secs)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl JwtConfig {
    /// Creates a new JwtConfig from a shared secret.
    ///
    /// # Arguments
    /// * `secret` - Symmetric signing key, at least [`MIN_SECRET_LEN`] bytes
    /// * `issuer` - Value for the `iss` claim
    /// * `audience` - Value for the `aud` claim
    /// * `expiry_minutes` - Token lifetime in minutes
    /// * `leeway_secs` - Clock skew tolerance in seconds
    pub fn new(
        secret: &str,
        issuer: &str,
        audience: &str,
        expiry_minutes: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::InvalidKey(format!(
                "Signing key must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            expiry_minutes,
            leeway_secs,
        })
    }

    /// Generates an access token. Returns the encoded token and its `jti`.
    pub fn generate_token(&self, subject: &TokenSubject<'_>) -> Result<(String, String), JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.email.to_string(),
            jti: jti.clone(),
            email: subject.email.to_string(),
            email_verified: subject.email_verified,
            uid: subject.user_id.to_string(),
            roles: subject.roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expiry_minutes)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok((token, jti))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature
                | jsonwebtoken::errors::ErrorKind::InvalidIssuer
                | jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Token lifetime in seconds, for `expires_in` style responses.
    pub fn expires_in_secs(&self) -> i64 {
        self.expiry_minutes * 60
    }
}

/// Extracts user ID from validated claims.
pub fn extract_user_id(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.uid).map_err(|_| JwtError::InvalidToken)
}
