//! On-the-fly health report endpoints.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use validator::Validate;

use domain::models::{HealthReportQuery, ReportRangeQuery};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{ApiPath, ApiQuery};
use crate::middleware::metrics::record_health_report;

/// Generate a report over the last `range` days.
///
/// GET /api/HealthReport?deviceId=<id>&range=<days>
///
/// Responds 204 with an empty body when no reading qualifies.
pub async fn get_health_report(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HealthReportQuery>,
) -> Result<Response, ApiError> {
    query.validate()?;

    let report = state
        .report_service
        .generate(&query.device_id, query.range, Utc::now())
        .await?;
    record_health_report(report.is_some());

    Ok(match report {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// Render the report as a PDF attachment.
///
/// GET /api/HealthReport/:deviceId/pdf?range=<days>
pub async fn get_health_report_pdf(
    State(state): State<AppState>,
    ApiPath(device_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<ReportRangeQuery>,
) -> Result<Response, ApiError> {
    query.validate()?;

    let now = Utc::now();
    let report = state
        .report_service
        .generate(&device_id, query.range, now)
        .await?;
    record_health_report(report.is_some());

    let report =
        report.ok_or_else(|| ApiError::NotFound("No health report data found.".to_string()))?;

    let renderer = state.pdf.clone();
    let bytes = tokio::task::spawn_blocking(move || renderer.render(&report))
        .await
        .map_err(|e| ApiError::Internal(format!("PDF task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        state.pdf.filename(&device_id, now)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::Internal(format!("Invalid header: {}", e)))?;

    tracing::info!(device_id = %device_id, bytes = bytes.len(), "Health report PDF rendered");

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
