//! Health report generation.
//!
//! A report aggregates the readings of one device over the last `range`
//! days. Only readings carrying motion, environmental and air-quality data
//! count; when none qualify there is no report.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::{DeviceStatus, HealthReport, SensorReading};
use crate::services::sensor_source::{SensorError, SensorSource};

/// Average AQI above which the air is flagged as poor.
pub const POOR_AIR_QUALITY_AQI: i64 = 100;

/// Millisecond window `[now - range days, now]`.
pub fn report_window(range_days: i32, now: DateTime<Utc>) -> (i64, i64) {
    let start = now - Duration::days(i64::from(range_days));
    (start.timestamp_millis(), now.timestamp_millis())
}

/// Builds a report from readings already restricted to the window.
///
/// Returns `None` when no reading has complete data.
pub fn generate_report(
    device_id: &str,
    range_days: i32,
    readings: &[SensorReading],
    status: Option<&DeviceStatus>,
    now: DateTime<Utc>,
) -> Option<HealthReport> {
    let points: Vec<&SensorReading> = readings.iter().filter(|r| r.is_complete()).collect();
    if points.is_empty() {
        return None;
    }

    let steps: Vec<i64> = points
        .iter()
        .filter_map(|r| r.motion.as_ref()?.step_count)
        .collect();
    let total_steps = match (steps.iter().max(), steps.iter().min()) {
        (Some(max), Some(min)) if steps.len() >= 2 => max - min,
        _ => 0,
    };
    let avg_daily_steps = mean(steps.iter().map(|s| *s as f64))
        .map(round_int)
        .unwrap_or(0);

    let env = |f: fn(&crate::models::sensor::Environmental) -> Option<f64>| {
        points
            .iter()
            .filter_map(move |r| r.environmental.as_ref().and_then(f))
    };
    let air = |f: fn(&crate::models::sensor::AirQuality) -> Option<f64>| {
        points.iter().filter_map(move |r| r.air_quality().and_then(f))
    };
    let vitals = |f: fn(&crate::models::sensor::Health) -> Option<f64>| {
        points
            .iter()
            .filter_map(move |r| r.health.as_ref().and_then(f))
    };

    let aqi: Vec<f64> = air(|a| a.aqi).collect();
    let avg_air_quality_index = mean(aqi.iter().copied()).map(round_int).unwrap_or(0);
    let min_aqi = aqi.iter().copied().reduce(f64::min).map(|v| v as i64).unwrap_or(0);
    let max_aqi = aqi.iter().copied().reduce(f64::max).map(|v| v as i64).unwrap_or(0);

    let fall_count = points
        .iter()
        .filter(|r| r.motion.as_ref().is_some_and(|m| m.fall_detected))
        .count() as i64;

    let mut report = HealthReport {
        device_id: device_id.to_string(),
        user_id: status.and_then(DeviceStatus::user_id),
        report_date: now,
        report_period: format!("{}-Day Average", range_days),
        total_steps,
        avg_daily_steps,
        avg_ambient_temp: mean(env(|e| e.temperature)).unwrap_or(0.0),
        avg_humidity: mean(env(|e| e.humidity)).map(round2).unwrap_or(0.0),
        avg_air_quality_index,
        min_aqi,
        max_aqi,
        avg_co2: mean(air(|a| a.co2)).map(round2).unwrap_or(0.0),
        avg_voc: mean(air(|a| a.voc)).map(round2).unwrap_or(0.0),
        avg_pm25: mean(air(|a| a.pm25)).map(round2).unwrap_or(0.0),
        avg_pm10: mean(air(|a| a.pm10)).map(round2).unwrap_or(0.0),
        avg_pressure: mean(env(|e| e.pressure)).map(round2).unwrap_or(0.0),
        avg_blood_pressure_systolic: mean(vitals(|h| h.blood_pressure.as_ref()?.systolic))
            .map(round2)
            .unwrap_or(0.0),
        avg_blood_pressure_diastolic: mean(vitals(|h| h.blood_pressure.as_ref()?.diastolic))
            .map(round2)
            .unwrap_or(0.0),
        avg_body_temperature: mean(vitals(|h| h.body_temperature))
            .map(round2)
            .unwrap_or(0.0),
        avg_heart_rate: mean(vitals(|h| h.heart_rate)).map(round2).unwrap_or(0.0),
        avg_oxygen_saturation: mean(vitals(|h| h.oxygen_saturation))
            .map(round_int)
            .unwrap_or(0),
        fall_count,
        data_point_count: points.len() as i64,
        status: String::new(),
        last_update: status.and_then(DeviceStatus::last_update_at),
    };
    report.status = determine_status(&report);

    Some(report)
}

/// Status label: "Normal", or "Warning: " followed by the raised warnings.
pub fn determine_status(report: &HealthReport) -> String {
    let mut warnings = Vec::new();

    if report.avg_air_quality_index > POOR_AIR_QUALITY_AQI {
        warnings.push("Poor Air Quality");
    }

    if warnings.is_empty() {
        "Normal".to_string()
    } else {
        format!("Warning: {}", warnings.join(", "))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn round_int(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Fetches readings for a device and builds its report.
#[derive(Clone)]
pub struct HealthReportService {
    sensors: Arc<dyn SensorSource>,
    deadline: Option<std::time::Duration>,
}

impl HealthReportService {
    pub fn new(sensors: Arc<dyn SensorSource>) -> Self {
        Self {
            sensors,
            deadline: None,
        }
    }

    /// Bound the time spent fetching readings and status for one report.
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Generates the report for `device_id` over the last `range_days` days.
    pub async fn generate(
        &self,
        device_id: &str,
        range_days: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<HealthReport>, SensorError> {
        let (start_ms, end_ms) = report_window(range_days, now);

        let (readings, status) = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.fetch(device_id, start_ms, end_ms))
                .await
                .map_err(|_| {
                    tracing::warn!(
                        device_id = %device_id,
                        deadline_ms = deadline.as_millis() as u64,
                        "Sensor feed exceeded report deadline"
                    );
                    SensorError::Unavailable(format!(
                        "no response within {} ms",
                        deadline.as_millis()
                    ))
                })??,
            None => self.fetch(device_id, start_ms, end_ms).await?,
        };

        let report = generate_report(device_id, range_days, &readings, status.as_ref(), now);

        tracing::debug!(
            device_id = %device_id,
            range_days = range_days,
            readings = readings.len(),
            data_points = report.as_ref().map(|r| r.data_point_count).unwrap_or(0),
            "Health report generated"
        );

        Ok(report)
    }

    async fn fetch(
        &self,
        device_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<(Vec<SensorReading>, Option<DeviceStatus>), SensorError> {
        let readings = self
            .sensors
            .readings_from_device(device_id, start_ms, end_ms)
            .await?;
        let status = self.sensors.device_status(device_id).await?;
        Ok((readings, status))
    }
}
