use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// JWT authentication configuration
    pub jwt: JwtAuthConfig,
    /// Email service configuration
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    /// Realtime database holding device readings
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Send Strict-Transport-Security; enable only behind TLS termination
    #[serde(default)]
    pub hsts_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// Symmetric HS256 signing key, at least 32 bytes
    pub secret: String,

    #[serde(default = "default_jwt_issuer")]
    pub issuer: String,

    #[serde(default = "default_jwt_audience")]
    pub audience: String,

    /// Access token lifetime in minutes (default: 60)
    #[serde(default = "default_jwt_expiry_minutes")]
    pub expiry_minutes: i64,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

fn default_jwt_issuer() -> String {
    "LifeGuard".to_string()
}

fn default_jwt_audience() -> String {
    "LifeGuardUser".to_string()
}

fn default_jwt_expiry_minutes() -> i64 {
    60
}

fn default_jwt_leeway() -> u64 {
    30
}

/// Email service configuration for OTP and password reset mail.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether email sending is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Email provider: smtp, sendgrid, or console (for development)
    #[serde(default = "default_email_provider")]
    pub provider: String,

    #[serde(default)]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: String,

    #[serde(default)]
    pub smtp_password: String,

    /// Use STARTTLS for SMTP (default: true)
    #[serde(default = "default_smtp_tls")]
    pub smtp_use_tls: bool,

    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Base URL of the web client, used for reset links
    #[serde(default = "default_reset_url")]
    pub reset_url: String,

    /// Email template style: html or plain
    #[serde(default = "default_template_style")]
    pub template_style: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_email_provider(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_use_tls: default_smtp_tls(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            reset_url: default_reset_url(),
            template_style: default_template_style(),
        }
    }
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_sender_email() -> String {
    "noreply@lifeguard.app".to_string()
}

fn default_sender_name() -> String {
    "LifeGuard".to_string()
}

fn default_reset_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_template_style() -> String {
    "html".to_string()
}

/// TOTP parameters used for e-mail verification codes.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    #[serde(default = "default_otp_step")]
    pub step_secs: u64,

    #[serde(default = "default_otp_digits")]
    pub digits: u32,

    /// Steps accepted either side of the current one
    #[serde(default = "default_otp_window")]
    pub window: u64,

    /// Base64 of a 32-byte AES-256-GCM key sealing stored secrets; empty
    /// stores them base64-encoded only
    #[serde(default)]
    pub secret_key: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            step_secs: default_otp_step(),
            digits: default_otp_digits(),
            window: default_otp_window(),
            secret_key: String::new(),
        }
    }
}

fn default_otp_step() -> u64 {
    30
}

fn default_otp_digits() -> u32 {
    6
}

fn default_otp_window() -> u64 {
    1
}

/// Firebase Realtime Database access.
///
/// When disabled the API serves readings from an empty in-memory source.
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Database root, e.g. `https://<project>.firebaseio.com`
    #[serde(default)]
    pub database_url: String,

    /// Service account JSON, inline or as a file path
    #[serde(default)]
    pub credentials: String,

    #[serde(default = "default_firebase_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_firebase_max_retries")]
    pub max_retries: u32,
}

/// Upper bound for `firebase.max_retries`.
pub const MAX_FIREBASE_RETRIES: u32 = 5;

impl FirebaseConfig {
    /// Longest one read can take: every attempt timing out plus the backoff.
    pub fn read_budget(&self) -> Duration {
        crate::services::firebase::read_budget(
            Duration::from_millis(self.timeout_ms),
            self.max_retries,
        )
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_url: String::new(),
            credentials: String::new(),
            timeout_ms: default_firebase_timeout_ms(),
            max_retries: default_firebase_max_retries(),
        }
    }
}

fn default_firebase_timeout_ms() -> u64 {
    2_500
}

fn default_firebase_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Role assigned to newly registered users
    #[serde(default = "default_role")]
    pub default_role: String,

    #[serde(default = "default_reset_token_expiry_hours")]
    pub reset_token_expiry_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            reset_token_expiry_hours: default_reset_token_expiry_hours(),
        }
    }
}

fn default_role() -> String {
    "User".to_string()
}

fn default_reset_token_expiry_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// Heading printed on rendered PDFs
    #[serde(default = "default_pdf_title")]
    pub pdf_title: String,

    /// Attachment file name prefix, followed by the device id
    #[serde(default = "default_pdf_filename_prefix")]
    pub pdf_filename_prefix: String,

    /// Time allowed for fetching sensor data for one report; must stay
    /// below `server.request_timeout_secs`
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            pdf_title: default_pdf_title(),
            pdf_filename_prefix: default_pdf_filename_prefix(),
            generation_timeout_ms: default_generation_timeout_ms(),
        }
    }
}

fn default_generation_timeout_ms() -> u64 {
    25_000
}

fn default_pdf_title() -> String {
    "LifeGuard Health Report".to_string()
}

fn default_pdf_filename_prefix() -> String {
    "HealthReport".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with LG__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("LG")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 2
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []

            [jwt]
            secret = "test-secret-key-that-is-at-least-32-bytes"
            issuer = "LifeGuard"
            audience = "LifeGuardUser"
            expiry_minutes = 60
            leeway_secs = 30

            [email]
            enabled = false
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "LG__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.jwt.secret.len() < shared::jwt::MIN_SECRET_LEN {
            return Err(ConfigValidationError::InvalidValue(format!(
                "LG__JWT__SECRET must be at least {} bytes",
                shared::jwt::MIN_SECRET_LEN
            )));
        }

        if self.jwt.expiry_minutes <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "jwt.expiry_minutes must be positive".to_string(),
            ));
        }

        if !matches!(self.email.provider.as_str(), "console" | "smtp" | "sendgrid") {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Unknown email provider '{}'",
                self.email.provider
            )));
        }

        if self.otp.step_secs == 0 || !(6..=8).contains(&self.otp.digits) {
            return Err(ConfigValidationError::InvalidValue(
                "otp.step_secs must be positive and otp.digits between 6 and 8".to_string(),
            ));
        }

        if !self.otp.secret_key.is_empty() {
            shared::secret_box::SecretBox::from_base64_key(&self.otp.secret_key).map_err(|e| {
                ConfigValidationError::InvalidValue(format!("LG__OTP__SECRET_KEY: {}", e))
            })?;
        }

        if self.firebase.enabled {
            if self.firebase.database_url.is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "LG__FIREBASE__DATABASE_URL must be set when firebase is enabled".to_string(),
                ));
            }
            if self.firebase.credentials.is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "LG__FIREBASE__CREDENTIALS must be set when firebase is enabled".to_string(),
                ));
            }
        }

        if self.firebase.max_retries > MAX_FIREBASE_RETRIES {
            return Err(ConfigValidationError::InvalidValue(format!(
                "firebase.max_retries cannot exceed {}",
                MAX_FIREBASE_RETRIES
            )));
        }

        let request_timeout = Duration::from_secs(self.server.request_timeout_secs);
        let generation_timeout = Duration::from_millis(self.reports.generation_timeout_ms);
        if generation_timeout.is_zero() || generation_timeout >= request_timeout {
            return Err(ConfigValidationError::InvalidValue(
                "reports.generation_timeout_ms must be positive and below server.request_timeout_secs"
                    .to_string(),
            ));
        }

        // a report reads the readings node and then the status node
        if self.firebase.enabled && self.firebase.read_budget() * 2 > generation_timeout {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Two firebase reads may take {} ms, more than reports.generation_timeout_ms ({} ms); \
                 lower firebase.timeout_ms or firebase.max_retries",
                (self.firebase.read_budget() * 2).as_millis(),
                self.reports.generation_timeout_ms
            )));
        }

        if self.auth.reset_token_expiry_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "auth.reset_token_expiry_hours must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
