//! Health report domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::validation::DEFAULT_REPORT_RANGE_DAYS;

/// Aggregate statistics over a device's readings for a window of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub device_id: String,
    pub user_id: Option<String>,
    pub report_date: DateTime<Utc>,
    pub report_period: String,
    pub total_steps: i64,
    pub avg_daily_steps: i64,
    pub avg_ambient_temp: f64,
    pub avg_humidity: f64,
    pub avg_air_quality_index: i64,
    pub min_aqi: i64,
    pub max_aqi: i64,
    pub avg_co2: f64,
    pub avg_voc: f64,
    pub avg_pm25: f64,
    pub avg_pm10: f64,
    pub avg_pressure: f64,
    pub avg_blood_pressure_systolic: f64,
    pub avg_blood_pressure_diastolic: f64,
    pub avg_body_temperature: f64,
    pub avg_heart_rate: f64,
    pub avg_oxygen_saturation: i64,
    pub fall_count: i64,
    pub data_point_count: i64,
    pub status: String,
    pub last_update: Option<DateTime<Utc>>,
}

/// A report persisted on request of an authenticated user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedHealthReport {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub report: HealthReport,
    pub created_at: DateTime<Utc>,
}

/// Query string for on-the-fly report generation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HealthReportQuery {
    #[validate(length(min = 1, max = 128, message = "deviceId is required"))]
    pub device_id: String,

    #[serde(default = "default_range")]
    #[validate(custom(function = "shared::validation::validate_report_range"))]
    pub range: i32,
}

/// Query string for the PDF endpoint, where the device comes from the path.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportRangeQuery {
    #[serde(default = "default_range")]
    #[validate(custom(function = "shared::validation::validate_report_range"))]
    pub range: i32,
}

/// Request payload for saving a report.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    #[validate(length(min = 1, max = 128, message = "deviceId is required"))]
    pub device_id: String,

    #[serde(default = "default_range")]
    #[validate(custom(function = "shared::validation::validate_report_range"))]
    pub range: i32,
}

fn default_range() -> i32 {
    DEFAULT_REPORT_RANGE_DAYS
}
