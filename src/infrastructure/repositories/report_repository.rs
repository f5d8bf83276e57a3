//! Report Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{NewReport, Report, ReportRepository, ReportStatus};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    reporter_id: i64,
    reported_user_id: i64,
    chat_id: Option<i64>,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

/// PostgreSQL report repository implementation.
#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            INSERT INTO reports (reporter_id, reported_user_id, chat_id, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, reporter_id, reported_user_id, chat_id, reason, status, created_at
            "#,
        )
        .bind(report.reporter_id)
        .bind(report.reported_user_id)
        .bind(report.chat_id)
        .bind(&report.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Reported user or chat not found".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(Report {
            id: row.id,
            reporter_id: row.reporter_id,
            reported_user_id: row.reported_user_id,
            chat_id: row.chat_id,
            reason: row.reason,
            status: ReportStatus::from_str(&row.status),
            created_at: row.created_at,
        })
    }
}
