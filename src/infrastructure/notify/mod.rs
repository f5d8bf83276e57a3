//! Report notification
//!
//! Tells the administrator that an abuse report was filed. Delivery is best
//! effort: callers log a failure and keep the stored report.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::config::ReportSettings;
use crate::domain::{Report, User};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait ReportNotifier: Send + Sync {
    async fn notify(&self, report: &Report, reporter: &User) -> Result<(), NotifyError>;
}

fn subject(report: &Report) -> String {
    format!("New report #{} against user {}", report.id, report.reported_user_id)
}

fn body(report: &Report, reporter: &User) -> String {
    let chat = report
        .chat_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "Reporter: {} <{}> (id {})\nReported user: {}\nChat: {}\nFiled at: {}\n\nReason:\n{}\n",
        reporter.display_name,
        reporter.email,
        reporter.id,
        report.reported_user_id,
        chat,
        report.created_at.to_rfc3339(),
        report.reason,
    )
}

/// Sends the notification by SMTP to the configured admin address.
pub struct SmtpReportNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpReportNotifier {
    pub fn new(settings: &ReportSettings) -> Result<Self, NotifyError> {
        let to: Mailbox = settings.admin_email.parse()?;
        let username = if settings.smtp_username.is_empty() {
            settings.admin_email.clone()
        } else {
            settings.smtp_username.clone()
        };
        let from: Mailbox = username.parse()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
            .credentials(Credentials::new(username, settings.smtp_password.clone()))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl ReportNotifier for SmtpReportNotifier {
    #[instrument(skip_all, fields(report_id = report.id))]
    async fn notify(&self, report: &Report, reporter: &User) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(report))
            .header(ContentType::TEXT_PLAIN)
            .body(body(report, reporter))?;

        self.transport.send(email).await?;
        info!("Report notification sent");
        Ok(())
    }
}

/// Writes the notification to the log; used when no SMTP relay is configured.
pub struct LogReportNotifier;

#[async_trait]
impl ReportNotifier for LogReportNotifier {
    async fn notify(&self, report: &Report, reporter: &User) -> Result<(), NotifyError> {
        info!(
            report_id = report.id,
            reporter_id = reporter.id,
            reported_user_id = report.reported_user_id,
            "{}",
            subject(report)
        );
        Ok(())
    }
}

/// SMTP when both a relay host and an admin address are configured, log otherwise.
pub fn build_notifier(settings: &ReportSettings) -> Result<Arc<dyn ReportNotifier>, NotifyError> {
    if settings.smtp_host.is_empty() || settings.admin_email.is_empty() {
        info!("SMTP not configured; report notifications go to the log");
        return Ok(Arc::new(LogReportNotifier));
    }
    Ok(Arc::new(SmtpReportNotifier::new(settings)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::domain::ReportStatus;

    fn report() -> Report {
        Report {
            id: 9,
            reporter_id: 1,
            reported_user_id: 2,
            chat_id: Some(7),
            reason: "spam links".into(),
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_body_names_both_parties() {
        let reporter = User::new(1, "ext".into(), "ann@example.com".into(), "Ann".into(), None);
        let text = body(&report(), &reporter);
        assert!(text.contains("Ann <ann@example.com>"));
        assert!(text.contains("Reported user: 2"));
        assert!(text.contains("spam links"));
    }

    #[test]
    fn test_unconfigured_smtp_falls_back_to_log() {
        let settings = ReportSettings {
            admin_email: String::new(),
            smtp_host: String::new(),
            smtp_username: String::new(),
            smtp_password: String::new(),
        };
        assert!(build_notifier(&settings).is_ok());
    }
}
