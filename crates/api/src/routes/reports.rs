//! Saved health report routes. All require a user JWT.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use domain::models::{CreateReportRequest, SavedHealthReport};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath};
use crate::middleware::metrics::record_health_report;
use crate::middleware::UserAuth;

/// Generate a report and save it for the caller.
///
/// POST /api/Reports
pub async fn create_report(
    State(state): State<AppState>,
    auth: UserAuth,
    ApiJson(request): ApiJson<CreateReportRequest>,
) -> Result<(StatusCode, Json<SavedHealthReport>), ApiError> {
    request.validate()?;

    let report = state
        .report_service
        .generate(&request.device_id, request.range, Utc::now())
        .await?;
    record_health_report(report.is_some());

    let mut report =
        report.ok_or_else(|| ApiError::NotFound("No health report data found.".to_string()))?;
    if report.user_id.is_none() {
        report.user_id = Some(auth.user_id.to_string());
    }

    let saved = state.reports.save(auth.user_id, &report).await?;

    tracing::info!(
        user_id = %auth.user_id,
        report_id = %saved.id,
        device_id = %saved.report.device_id,
        "Health report saved"
    );

    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/Reports
pub async fn list_reports(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<SavedHealthReport>>, ApiError> {
    let reports = state.reports.list_for_owner(auth.user_id).await?;
    Ok(Json(reports))
}

/// DELETE /api/Reports/:id
pub async fn delete_report(
    State(state): State<AppState>,
    auth: UserAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.reports.delete(auth.user_id, id).await? {
        return Err(ApiError::NotFound("Report not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, report_id = %id, "Health report deleted");
    Ok(StatusCode::NO_CONTENT)
}
