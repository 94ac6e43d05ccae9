//! Common test utilities for integration tests.
//!
//! The router runs over in-memory stores and a static sensor feed, so no
//! database or Firebase project is needed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::Utc;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use tower::ServiceExt;

use domain::models::SensorReading;
use domain::models::DeviceStatus;
use domain::services::{
    InMemoryHealthReportStore, InMemoryUserStore, SensorError, SensorSource, StaticSensorSource,
};
use lifeguard_api::app::{create_app, AppDeps};
use lifeguard_api::config::{
    AuthConfig, Config, DatabaseConfig, EmailConfig, FirebaseConfig, JwtAuthConfig,
    LoggingConfig, OtpConfig, ReportsConfig, SecurityConfig, ServerConfig,
};

pub const PASSWORD: &str = "Guardian42";

/// Test configuration with e-mail disabled.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig::default(),
        jwt: JwtAuthConfig {
            secret: "test-secret-key-that-is-at-least-32-bytes".to_string(),
            issuer: "LifeGuard".to_string(),
            audience: "LifeGuardUser".to_string(),
            expiry_minutes: 60,
            leeway_secs: 30,
        },
        email: EmailConfig::default(),
        otp: OtpConfig::default(),
        firebase: FirebaseConfig::default(),
        auth: AuthConfig::default(),
        reports: ReportsConfig::default(),
    }
}

/// Configuration whose e-mail provider is enabled but cannot send.
pub fn failing_email_config() -> Config {
    let mut config = test_config();
    config.email = EmailConfig {
        enabled: true,
        provider: "sendgrid".to_string(),
        sendgrid_api_key: String::new(),
        ..EmailConfig::default()
    };
    config
}

/// Router plus handles on its stores.
pub struct TestApp {
    pub router: Router,
    pub users: Arc<InMemoryUserStore>,
    pub reports: Arc<InMemoryHealthReportStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), StaticSensorSource::new())
    }

    pub fn with(config: Config, sensors: impl SensorSource + 'static) -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        let reports = Arc::new(InMemoryHealthReportStore::new());
        let router = create_app(
            config,
            AppDeps {
                pool: None,
                users: users.clone(),
                reports: reports.clone(),
                sensors: Arc::new(sensors),
            },
        )
        .expect("Failed to build app");

        Self {
            router,
            users,
            reports,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Register `email` and return a bearer token for it.
    pub async fn register_and_login(&self, email: &str) -> String {
        let name: String = Name().fake();
        self.send(json_request(
            Method::POST,
            "/api/Account/register",
            json!({"name": name, "email": email, "password": PASSWORD}),
        ))
        .await;

        let response = self
            .send(json_request(
                Method::POST,
                "/api/Account/login",
                json!({"email": email, "password": PASSWORD}),
            ))
            .await;
        let body = parse_response_body(response).await;
        body["token"].as_str().unwrap().to_string()
    }
}

/// Helper to create a JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Helper to create an authenticated request.
pub fn authed_request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Helper to parse JSON response body.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// A complete reading taken `ago_ms` before now.
pub fn reading(device_id: &str, ago_ms: i64, steps: i64, aqi: f64) -> SensorReading {
    serde_json::from_value(json!({
        "deviceId": device_id,
        "timestamp": Utc::now().timestamp_millis() - ago_ms,
        "environmental": {
            "temperature": 21.0,
            "humidity": 40.0,
            "airQuality": { "aqi": aqi }
        },
        "motion": { "stepCount": steps, "fallDetected": false }
    }))
    .unwrap()
}

/// Sensor feed with two readings for `dev-1`: steps 100 and 220.
pub fn sample_sensors() -> StaticSensorSource {
    StaticSensorSource::new().with_readings(
        "dev-1",
        vec![reading("dev-1", 60_000, 100, 40.0), reading("dev-1", 30_000, 220, 60.0)],
    )
}

/// Sensor feed that never answers within a test's lifetime.
pub struct StalledSensorSource;

#[async_trait::async_trait]
impl SensorSource for StalledSensorSource {
    async fn readings_from_device(
        &self,
        _device_id: &str,
        _start_ms: i64,
        _end_ms: i64,
    ) -> Result<Vec<SensorReading>, SensorError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn device_status(&self, _device_id: &str) -> Result<Option<DeviceStatus>, SensorError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(None)
    }
}
