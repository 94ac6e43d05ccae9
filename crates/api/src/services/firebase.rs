//! Firebase Realtime Database sensor source.
//!
//! Reads `devices/{deviceId}/sensorData` and `devices/{deviceId}/status`
//! over the REST API, authenticating with a service-account OAuth2 token.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use domain::models::{DeviceStatus, SensorReading};
use domain::services::{SensorError, SensorSource};

use crate::config::FirebaseConfig;

const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/firebase.database \
                            https://www.googleapis.com/auth/userinfo.email";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Sensor source backed by the Firebase Realtime Database REST API.
pub struct FirebaseSensorSource {
    client: Client,
    database_url: Url,
    max_retries: u32,
    credentials: ServiceAccountCredentials,
    token_cache: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Google service account credentials structure.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    /// Private key in PEM format.
    private_key: String,
    token_uri: String,
}

/// JWT claims for Google OAuth2 service account authentication.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Errors raised while setting up the source.
#[derive(Debug, thiserror::Error)]
pub enum FirebaseSetupError {
    #[error("Failed to load credentials: {0}")]
    Credentials(String),

    #[error("Invalid database URL: {0}")]
    DatabaseUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl FirebaseSensorSource {
    /// Create a source from configuration.
    ///
    /// `config.credentials` holds either the service account JSON itself or
    /// a path to it.
    pub fn new(config: &FirebaseConfig) -> Result<Self, FirebaseSetupError> {
        let credentials = load_credentials(&config.credentials)?;

        let database_url = Url::parse(config.database_url.trim_end_matches('/'))
            .map_err(|e| FirebaseSetupError::DatabaseUrl(e.to_string()))?;
        if database_url.cannot_be_a_base() {
            return Err(FirebaseSetupError::DatabaseUrl(config.database_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            database_url,
            max_retries: config.max_retries,
            credentials,
            token_cache: RwLock::new(None),
        })
    }

    /// A valid OAuth2 access token, refreshed when close to expiry.
    async fn access_token(&self) -> Result<String, SensorError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(token) = cache.as_ref() {
                if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.token_cache.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(token) = cache.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_access_token().await?;
        let access_token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(access_token)
    }

    /// Exchange a signed assertion for an access token.
    async fn fetch_access_token(&self) -> Result<CachedToken, SensorError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.credentials.client_email,
            scope: OAUTH_SCOPES,
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let key = jsonwebtoken::EncodingKey::from_rsa_pem(
            normalize_pem(&self.credentials.private_key).as_bytes(),
        )
        .map_err(|e| SensorError::Auth(format!("Invalid private key: {}", e)))?;
        let assertion = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &key,
        )
        .map_err(|e| SensorError::Auth(format!("Failed to sign assertion: {}", e)))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SensorError::Unavailable(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SensorError::Auth(format!(
                "Token exchange returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SensorError::Auth(format!("Malformed token response: {}", e)))?;

        tracing::debug!(expires_in = token.expires_in, "Firebase access token refreshed");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    fn node_url(&self, device_id: &str, node: &str) -> Result<Url, SensorError> {
        let file = format!("{}.json", node);
        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|_| SensorError::Unavailable("Database URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["devices", device_id, file.as_str()]);
        Ok(url)
    }

    /// GET a node as JSON, retrying network errors and 5xx responses.
    async fn get_json(&self, url: Url) -> Result<serde_json::Value, SensorError> {
        let access_token = self.access_token().await?;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let response = match self
                .client
                .get(url.clone())
                .bearer_auth(&access_token)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Firebase request failed");
                    last_error = Some(SensorError::Unavailable(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| SensorError::Decode(e.to_string()));
            }

            let body = response.text().await.unwrap_or_default();
            let error = upstream_error(status, body);
            if !status.is_server_error() {
                return Err(error);
            }

            tracing::warn!(attempt = attempt, status = %status, "Firebase returned server error");
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| SensorError::Unavailable("No attempt was made".to_string())))
    }
}

#[async_trait]
impl SensorSource for FirebaseSensorSource {
    async fn readings_from_device(
        &self,
        device_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<SensorReading>, SensorError> {
        let url = self.node_url(device_id, "sensorData")?;
        let value = self.get_json(url).await?;

        let mut readings: Vec<SensorReading> = decode_readings(device_id, value)
            .into_iter()
            .filter(|r| r.within(start_ms, end_ms))
            .collect();
        readings.sort_by_key(|r| r.timestamp);

        tracing::debug!(
            device_id = %device_id,
            start_ms = start_ms,
            end_ms = end_ms,
            count = readings.len(),
            "Fetched sensor readings"
        );
        Ok(readings)
    }

    async fn device_status(&self, device_id: &str) -> Result<Option<DeviceStatus>, SensorError> {
        let url = self.node_url(device_id, "status")?;
        match self.get_json(url).await? {
            serde_json::Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SensorError::Decode(format!("device status: {}", e))),
        }
    }
}

/// Delay before retry `attempt` (1-based): 100ms, 200ms, 400ms, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100u64.saturating_mul(1u64 << attempt.saturating_sub(1).min(16)))
}

/// Worst-case duration of one read: every attempt hits `timeout` and every
/// retry waits out its backoff.
pub fn read_budget(timeout: Duration, max_retries: u32) -> Duration {
    (1..=max_retries).map(backoff_delay).sum::<Duration>() + timeout * (max_retries + 1)
}

fn upstream_error(status: StatusCode, body: String) -> SensorError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SensorError::Auth(format!("{}: {}", status, body))
        }
        _ => SensorError::Upstream {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Readings under a `sensorData` node. Entries that do not decode are skipped.
fn decode_readings(device_id: &str, value: serde_json::Value) -> Vec<SensorReading> {
    let entries: Vec<(String, serde_json::Value)> = match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        // numeric keys come back as a sparse array
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter(|(_, v)| v.is_object())
        .filter_map(|(key, v)| match serde_json::from_value::<SensorReading>(v) {
            Ok(mut reading) => {
                if reading.device_id.is_empty() {
                    reading.device_id = device_id.to_string();
                }
                Some(reading)
            }
            Err(e) => {
                tracing::warn!(device_id = %device_id, key = %key, error = %e, "Skipping malformed reading");
                None
            }
        })
        .collect()
}

fn load_credentials(source: &str) -> Result<ServiceAccountCredentials, FirebaseSetupError> {
    let json = if source.trim_start().starts_with('{') {
        source.to_string()
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| FirebaseSetupError::Credentials(format!("{}: {}", source, e)))?
    };
    serde_json::from_str(&json)
        .map_err(|e| FirebaseSetupError::Credentials(format!("Invalid JSON: {}", e)))
}

/// Keys passed through env vars often carry literal `\n` sequences.
fn normalize_pem(key: &str) -> String {
    key.trim_matches('"').replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TEST_PRIVATE_KEY: &str = include_str!("testdata/service_account_key.pem");

    /// How the fake database answers reads. Token requests always succeed.
    #[derive(Clone, Copy)]
    enum Reply {
        Status(u16, &'static str),
        Stall,
    }

    struct FakeFirebase {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFirebase {
        async fn start(reply: Reply) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));

            let log = requests.clone();
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let log = log.clone();
                    tokio::spawn(async move {
                        let Some(line) = read_request(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(line.clone());

                        let (status, body) = if line.starts_with("POST /token") {
                            (200, r#"{"access_token": "test-token", "expires_in": 3600}"#)
                        } else {
                            match reply {
                                Reply::Status(status, body) => (status, body),
                                Reply::Stall => {
                                    tokio::time::sleep(Duration::from_secs(60)).await;
                                    return;
                                }
                            }
                        };

                        let response = format!(
                            "HTTP/1.1 {} Fake\r\ncontent-type: application/json\r\n\
                             content-length: {}\r\nconnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { addr, requests }
        }

        fn source(&self, timeout_ms: u64, max_retries: u32) -> FirebaseSensorSource {
            let credentials = json!({
                "client_email": "svc@lifeguard-test.iam.gserviceaccount.com",
                "private_key": TEST_PRIVATE_KEY,
                "token_uri": format!("http://{}/token", self.addr),
            });
            FirebaseSensorSource::new(&FirebaseConfig {
                enabled: true,
                database_url: format!("http://{}", self.addr),
                credentials: credentials.to_string(),
                timeout_ms,
                max_retries,
            })
            .unwrap()
        }

        fn count(&self, prefix: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|line| line.starts_with(prefix))
                .count()
        }
    }

    /// Reads one request and returns its method and path.
    async fn read_request(socket: &mut TcpStream) -> Option<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut parts = head.lines().next()?.split_whitespace();
        Some(format!("{} {}", parts.next()?, parts.next()?))
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let firebase = FakeFirebase::start(Reply::Status(503, r#"{"error": "down"}"#)).await;
        let source = firebase.source(1_000, 2);

        let result = source.readings_from_device("dev-1", 0, i64::MAX).await;

        assert!(matches!(result, Err(SensorError::Upstream { status: 503, .. })));
        assert_eq!(firebase.count("GET /devices/dev-1/sensorData.json"), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let firebase = FakeFirebase::start(Reply::Status(404, r#"{"error": "missing"}"#)).await;
        let source = firebase.source(1_000, 3);

        let result = source.device_status("dev-1").await;

        assert!(matches!(result, Err(SensorError::Upstream { status: 404, .. })));
        assert_eq!(firebase.count("GET "), 1);
    }

    #[tokio::test]
    async fn test_access_token_is_reused() {
        let firebase = FakeFirebase::start(Reply::Status(200, "null")).await;
        let source = firebase.source(1_000, 0);

        let readings = source.readings_from_device("dev-1", 0, i64::MAX).await.unwrap();
        let status = source.device_status("dev-1").await.unwrap();

        assert!(readings.is_empty());
        assert!(status.is_none());
        assert_eq!(firebase.count("POST /token"), 1);
        assert_eq!(firebase.count("GET "), 2);
    }

    #[tokio::test]
    async fn test_stalled_reads_stop_within_budget() {
        let firebase = FakeFirebase::start(Reply::Stall).await;
        let source = firebase.source(200, 1);

        let started = Instant::now();
        let result = source.readings_from_device("dev-1", 0, i64::MAX).await;

        assert!(matches!(result, Err(SensorError::Unavailable(_))));
        assert_eq!(firebase.count("GET "), 2);
        let budget = read_budget(Duration::from_millis(200), 1);
        assert!(started.elapsed() < budget + Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_read_budget() {
        assert_eq!(
            read_budget(Duration::from_millis(300), 3),
            Duration::from_millis(4 * 300 + 700)
        );
        assert_eq!(read_budget(Duration::from_secs(1), 0), Duration::from_secs(1));
    }

    #[test]
    fn test_upstream_error_kinds() {
        assert!(matches!(
            upstream_error(StatusCode::UNAUTHORIZED, String::new()),
            SensorError::Auth(_)
        ));
        assert!(matches!(
            upstream_error(StatusCode::BAD_REQUEST, "bad".into()),
            SensorError::Upstream { status: 400, .. }
        ));
    }

    #[test]
    fn test_decode_readings_skips_malformed_entries() {
        let value = json!({
            "-Nabc": {
                "timestamp": 1_700_000_000_000i64,
                "motion": { "stepCount": 120, "fallDetected": false },
                "environmental": { "temperature": 21.5, "airQuality": { "aqi": 42 } }
            },
            "-Nbad": { "timestamp": "yesterday" },
            "test": "hello"
        });

        let readings = decode_readings("dev-1", value);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].device_id, "dev-1");
        assert!(readings[0].is_complete());
    }

    #[test]
    fn test_decode_readings_null_and_array() {
        assert!(decode_readings("dev-1", serde_json::Value::Null).is_empty());

        let value = json!([null, { "timestamp": 5 }]);
        let readings = decode_readings("dev-1", value);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].timestamp, 5);
    }

    #[test]
    fn test_load_inline_credentials() {
        let creds = load_credentials(
            r#"{"client_email": "svc@example.iam.gserviceaccount.com",
                "private_key": "key", "token_uri": "https://oauth2.googleapis.com/token"}"#,
        )
        .unwrap();
        assert_eq!(creds.client_email, "svc@example.iam.gserviceaccount.com");

        assert!(matches!(
            load_credentials("/nonexistent/credentials.json"),
            Err(FirebaseSetupError::Credentials(_))
        ));
    }

    #[test]
    fn test_node_url_encodes_device_id() {
        let config = FirebaseConfig {
            enabled: true,
            database_url: "https://lifeguard.firebaseio.com/".to_string(),
            credentials: r#"{"client_email": "a", "private_key": "k", "token_uri": "https://t"}"#
                .to_string(),
            ..FirebaseConfig::default()
        };
        let source = FirebaseSensorSource::new(&config).unwrap();

        let url = source.node_url("dev 1", "sensorData").unwrap();
        assert_eq!(
            url.as_str(),
            "https://lifeguard.firebaseio.com/devices/dev%201/sensorData.json"
        );
    }

    #[test]
    fn test_normalize_pem() {
        assert_eq!(normalize_pem("\"a\\nb\""), "a\nb");
    }
}
