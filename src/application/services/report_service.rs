//! Report Service
//!
//! Stores abuse reports and tells the administrator about them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::dto::{CreateReportRequest, ReportResponse};
use crate::domain::{NewReport, ReportRepository, User, UserRepository};
use crate::infrastructure::notify::ReportNotifier;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;

pub struct ReportService {
    users: Arc<dyn UserRepository>,
    reports: Arc<dyn ReportRepository>,
    notifier: Arc<dyn ReportNotifier>,
}

impl ReportService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        reports: Arc<dyn ReportRepository>,
        notifier: Arc<dyn ReportNotifier>,
    ) -> Self {
        Self {
            users,
            reports,
            notifier,
        }
    }

    /// File a report. A failed notification is logged; the report stays stored.
    pub async fn file(
        &self,
        reporter: &User,
        request: CreateReportRequest,
    ) -> Result<ReportResponse, AppError> {
        let reported_user_id = parse_id(&request.reported_user_id, "user")?;
        let chat_id = request
            .chat_id
            .as_deref()
            .map(|raw| parse_id(raw, "chat"))
            .transpose()?;
        if reported_user_id == reporter.id {
            return Err(AppError::BadRequest("Cannot report yourself".into()));
        }
        if self.users.find_by_id(reported_user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }

        let report = self
            .reports
            .insert_report(&NewReport {
                reporter_id: reporter.id,
                reported_user_id,
                chat_id,
                reason: request.reason.trim().to_string(),
            })
            .await?;
        info!(report_id = report.id, reporter_id = reporter.id, reported_user_id, "Report filed");

        if let Err(e) = self.notifier.notify(&report, reporter).await {
            warn!(report_id = report.id, error = %e, "Report notification failed");
        }

        Ok(report.into())
    }
}
