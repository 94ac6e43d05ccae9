//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub sensor_feed: SensorFeedHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Which sensor feed the server reads from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SensorFeedHealth {
    pub firebase_enabled: bool,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn check_store(state: &AppState) -> (bool, u64) {
    let start = std::time::Instant::now();
    let connected = state.users.ping().await.is_ok();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if let Some(pool) = &state.pool {
        persistence::metrics::record_pool_metrics(pool);
    }

    (connected, latency_ms)
}

/// Full health check endpoint.
///
/// Returns 503 when the user store cannot be reached.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let (db_connected, latency_ms) = check_store(&state).await;

    let response = HealthResponse {
        status: if db_connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected: db_connected,
            latency_ms: db_connected.then_some(latency_ms),
        },
        sensor_feed: SensorFeedHealth {
            firebase_enabled: state.config.firebase.enabled,
        },
    };

    if db_connected {
        Ok(Json(response))
    } else {
        tracing::warn!("Health check failed: user store unreachable");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Liveness probe endpoint.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let (db_connected, _) = check_store(&state).await;

    if db_connected {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
