//! Report entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
}

impl ReportStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "reviewed" => Self::Reviewed,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
        }
    }
}

/// An abuse report filed by one user about another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub reported_user_id: i64,
    pub chat_id: Option<i64>,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub reporter_id: i64,
    pub reported_user_id: i64,
    pub chat_id: Option<i64>,
    pub reason: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError>;
}
