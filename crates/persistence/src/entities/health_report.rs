//! Saved health report entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{HealthReport, SavedHealthReport};

/// Database row mapping for the health_reports table.
#[derive(Debug, Clone, FromRow)]
pub struct HealthReportEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
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
    pub created_at: DateTime<Utc>,
}

impl From<HealthReportEntity> for SavedHealthReport {
    fn from(entity: HealthReportEntity) -> Self {
        Self {
            id: entity.id,
            owner_id: entity.owner_id,
            report: HealthReport {
                device_id: entity.device_id,
                user_id: entity.user_id,
                report_date: entity.report_date,
                report_period: entity.report_period,
                total_steps: entity.total_steps,
                avg_daily_steps: entity.avg_daily_steps,
                avg_ambient_temp: entity.avg_ambient_temp,
                avg_humidity: entity.avg_humidity,
                avg_air_quality_index: entity.avg_air_quality_index,
                min_aqi: entity.min_aqi,
                max_aqi: entity.max_aqi,
                avg_co2: entity.avg_co2,
                avg_voc: entity.avg_voc,
                avg_pm25: entity.avg_pm25,
                avg_pm10: entity.avg_pm10,
                avg_pressure: entity.avg_pressure,
                avg_blood_pressure_systolic: entity.avg_blood_pressure_systolic,
                avg_blood_pressure_diastolic: entity.avg_blood_pressure_diastolic,
                avg_body_temperature: entity.avg_body_temperature,
                avg_heart_rate: entity.avg_heart_rate,
                avg_oxygen_saturation: entity.avg_oxygen_saturation,
                fall_count: entity.fall_count,
                data_point_count: entity.data_point_count,
                status: entity.status,
                last_update: entity.last_update,
            },
            created_at: entity.created_at,
        }
    }
}
