//! Source of device sensor readings.
//!
//! Production reads come from the realtime database; [`StaticSensorSource`]
//! serves fixed data for development and tests.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{DeviceStatus, SensorReading};

/// Error type for sensor feed access.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor feed unavailable: {0}")]
    Unavailable(String),

    #[error("Sensor feed returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Failed to decode sensor data: {0}")]
    Decode(String),

    #[error("Sensor feed authentication failed: {0}")]
    Auth(String),
}

/// Read access to the readings and status marker of a device.
#[async_trait::async_trait]
pub trait SensorSource: Send + Sync {
    /// Readings whose timestamp lies in `start_ms..=end_ms`.
    async fn readings_from_device(
        &self,
        device_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<SensorReading>, SensorError>;

    /// Last-write marker of the device, if one exists.
    async fn device_status(&self, device_id: &str) -> Result<Option<DeviceStatus>, SensorError>;
}

/// In-memory sensor source for development and testing.
#[derive(Debug, Clone, Default)]
pub struct StaticSensorSource {
    readings: HashMap<String, Vec<SensorReading>>,
    statuses: HashMap<String, DeviceStatus>,
    /// Whether to simulate an unreachable feed.
    pub simulate_failure: bool,
}

impl StaticSensorSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source whose every call fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Add readings for a device.
    pub fn with_readings(mut self, device_id: &str, readings: Vec<SensorReading>) -> Self {
        self.readings
            .entry(device_id.to_string())
            .or_default()
            .extend(readings);
        self
    }

    /// Set the status marker of a device.
    pub fn with_status(mut self, device_id: &str, status: DeviceStatus) -> Self {
        self.statuses.insert(device_id.to_string(), status);
        self
    }
}

#[async_trait::async_trait]
impl SensorSource for StaticSensorSource {
    async fn readings_from_device(
        &self,
        device_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<SensorReading>, SensorError> {
        if self.simulate_failure {
            tracing::warn!(device_id = %device_id, "Static sensor source simulating failure");
            return Err(SensorError::Unavailable("Simulated failure".to_string()));
        }

        Ok(self
            .readings
            .get(device_id)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| r.within(start_ms, end_ms))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn device_status(&self, device_id: &str) -> Result<Option<DeviceStatus>, SensorError> {
        if self.simulate_failure {
            return Err(SensorError::Unavailable("Simulated failure".to_string()));
        }
        Ok(self.statuses.get(device_id).cloned())
    }
}
