//! Sensor reading domain models.
//!
//! Readings are written by the wearable into the realtime database under
//! `devices/{deviceId}/sensorData/{entryKey}`; the server only reads them.
//! Every sub-object and scalar may be absent.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Three-axis sample from the accelerometer or gyroscope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQuality {
    pub aqi: Option<f64>,
    pub co2: Option<f64>,
    pub pm10: Option<f64>,
    pub pm25: Option<f64>,
    pub voc: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environmental {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub air_quality: Option<AirQuality>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motion {
    pub step_count: Option<i64>,
    pub accelerometer: Option<Vector3>,
    pub gyroscope: Option<Vector3>,
    pub activity: Option<String>,
    #[serde(default)]
    pub fall_detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodPressure {
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

/// Vital signs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub heart_rate: Option<f64>,
    pub blood_pressure: Option<BloodPressure>,
    pub oxygen_saturation: Option<f64>,
    pub body_temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

/// A single time-stamped reading pushed by a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    #[serde(default)]
    pub device_id: String,
    pub device_name: Option<String>,
    pub user_id: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
    pub location: Option<GeoLocation>,
    pub environmental: Option<Environmental>,
    pub motion: Option<Motion>,
    pub health: Option<Health>,
}

impl SensorReading {
    /// Air-quality block, if the reading carries one.
    pub fn air_quality(&self) -> Option<&AirQuality> {
        self.environmental.as_ref()?.air_quality.as_ref()
    }

    /// True when the reading has motion, environmental and air-quality data.
    pub fn is_complete(&self) -> bool {
        self.motion.is_some() && self.air_quality().is_some()
    }

    /// True when `timestamp` lies in `start_ms..=end_ms`.
    pub fn within(&self, start_ms: i64, end_ms: i64) -> bool {
        (start_ms..=end_ms).contains(&self.timestamp)
    }
}

/// Last-write marker stored under `devices/{deviceId}/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub connected: bool,
    pub device_name: Option<String>,
    /// `user_{userId}_{timestamp}` or `anonymous_{timestamp}`
    pub last_data_key: Option<String>,
    /// Milliseconds since the Unix epoch
    pub last_seen: Option<i64>,
    /// RFC 3339 timestamp of the last write
    pub last_update: Option<String>,
}

/// Longest user id accepted from a device status key.
pub const MAX_USER_ID_LEN: usize = 128;

impl DeviceStatus {
    /// User that pushed the latest entry, parsed from `last_data_key`.
    ///
    /// Ids longer than [`MAX_USER_ID_LEN`] are ignored.
    pub fn user_id(&self) -> Option<String> {
        let key = self.last_data_key.as_deref()?;
        let rest = key.strip_prefix("user_")?;
        let (user_id, timestamp) = rest.rsplit_once('_')?;

        if user_id.is_empty()
            || user_id.len() > MAX_USER_ID_LEN
            || timestamp.is_empty()
            || !timestamp.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        Some(user_id.to_string())
    }

    /// Time of the last write, from `last_update` or else `last_seen`.
    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                self.last_seen
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            })
    }
}
