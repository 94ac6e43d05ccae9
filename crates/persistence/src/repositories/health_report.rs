//! Saved health report repository.

use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{HealthReport, SavedHealthReport};
use domain::services::{HealthReportStore, StoreError};

use super::to_store_error;
use crate::entities::HealthReportEntity;
use crate::metrics::QueryTimer;

const REPORT_COLUMNS: &str = "id, owner_id, device_id, user_id, report_date, report_period, \
     total_steps, avg_daily_steps, avg_ambient_temp, avg_humidity, avg_air_quality_index, \
     min_aqi, max_aqi, avg_co2, avg_voc, avg_pm25, avg_pm10, avg_pressure, \
     avg_blood_pressure_systolic, avg_blood_pressure_diastolic, avg_body_temperature, \
     avg_heart_rate, avg_oxygen_saturation, fall_count, data_point_count, status, \
     last_update, created_at";

/// Repository for saved health reports.
#[derive(Clone)]
pub struct HealthReportRepository {
    pool: PgPool,
}

impl HealthReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a report owned by `owner_id`.
    pub async fn insert(
        &self,
        owner_id: Uuid,
        report: &HealthReport,
    ) -> Result<HealthReportEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_health_report");
        let result = sqlx::query_as::<_, HealthReportEntity>(&format!(
            r#"
            INSERT INTO health_reports (
                owner_id, device_id, user_id, report_date, report_period,
                total_steps, avg_daily_steps, avg_ambient_temp, avg_humidity,
                avg_air_quality_index, min_aqi, max_aqi, avg_co2, avg_voc, avg_pm25,
                avg_pm10, avg_pressure, avg_blood_pressure_systolic,
                avg_blood_pressure_diastolic, avg_body_temperature, avg_heart_rate,
                avg_oxygen_saturation, fall_count, data_point_count, status, last_update
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&report.device_id)
        .bind(&report.user_id)
        .bind(report.report_date)
        .bind(&report.report_period)
        .bind(report.total_steps)
        .bind(report.avg_daily_steps)
        .bind(report.avg_ambient_temp)
        .bind(report.avg_humidity)
        .bind(report.avg_air_quality_index)
        .bind(report.min_aqi)
        .bind(report.max_aqi)
        .bind(report.avg_co2)
        .bind(report.avg_voc)
        .bind(report.avg_pm25)
        .bind(report.avg_pm10)
        .bind(report.avg_pressure)
        .bind(report.avg_blood_pressure_systolic)
        .bind(report.avg_blood_pressure_diastolic)
        .bind(report.avg_body_temperature)
        .bind(report.avg_heart_rate)
        .bind(report.avg_oxygen_saturation)
        .bind(report.fall_count)
        .bind(report.data_point_count)
        .bind(&report.status)
        .bind(report.last_update)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Reports owned by `owner_id`, newest first.
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<HealthReportEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_health_reports_by_owner");
        let result = sqlx::query_as::<_, HealthReportEntity>(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM health_reports
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Delete a report if it belongs to `owner_id`. Returns rows affected.
    pub async fn delete_owned(&self, owner_id: Uuid, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_health_report");
        let result = sqlx::query(
            r#"
            DELETE FROM health_reports
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl HealthReportStore for HealthReportRepository {
    async fn save(
        &self,
        owner_id: Uuid,
        report: &HealthReport,
    ) -> Result<SavedHealthReport, StoreError> {
        self.insert(owner_id, report)
            .await
            .map(Into::into)
            .map_err(to_store_error)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<SavedHealthReport>, StoreError> {
        let entities = self.list_by_owner(owner_id).await.map_err(to_store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let affected = self
            .delete_owned(owner_id, id)
            .await
            .map_err(to_store_error)?;
        Ok(affected > 0)
    }
}
