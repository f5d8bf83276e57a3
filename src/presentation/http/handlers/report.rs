//! Report Handlers

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{CreateReportRequest, ReportResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// File an abuse report
pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateReportRequest>,
) -> Result<(StatusCode, Json<ReportResponse>), AppError> {
    let reporter = state.users.get_user(auth.user_id).await?;
    let report = state.reports.file(&reporter, body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}
