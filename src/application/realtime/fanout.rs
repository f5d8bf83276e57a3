//! Message Fan-out Engine
//!
//! Accepts a message submission, makes it durable, and pushes it to every
//! connected session of every chat member.
//!
//! Submissions to one chat run one at a time through that chat's lane, from
//! membership check to the last push enqueued. The store assigns message ids
//! in commit order, so every session sees a chat's messages in id order.
//! Submissions to different chats never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn, Instrument};

use super::dispatcher::{Audience, DeliveryReport, Dispatcher};
use super::events::ServerEvent;
use crate::application::dto::MessageResponse;
use crate::config::FanoutSettings;
use crate::domain::{MembershipResolver, MessageKind, MessageRepository, NewMessage};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// A message as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitMessage {
    pub chat_id: i64,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Chat {0} not found")]
    ChatNotFound(i64),

    #[error("Not a member of this chat")]
    Forbidden,

    #[error("{0}")]
    Invalid(String),

    #[error("Timed out persisting message")]
    PersistTimeout,

    #[error("Timed out reading {0}")]
    StoreTimeout(&'static str),

    #[error("Failed to persist message: {0}")]
    Persistence(String),
}

impl SubmitError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::ChatNotFound(_) => "not_found",
            Self::Forbidden => "forbidden",
            Self::Invalid(_) => "invalid",
            Self::PersistTimeout | Self::StoreTimeout(_) | Self::Persistence(_) => "failed",
        }
    }

    fn from_membership(chat_id: i64, err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => Self::ChatNotFound(chat_id),
            AppError::Forbidden(_) => Self::Forbidden,
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ChatNotFound(_) => AppError::NotFound(err.to_string()),
            SubmitError::Forbidden => AppError::Forbidden(err.to_string()),
            SubmitError::Invalid(msg) => AppError::Validation(msg),
            SubmitError::PersistTimeout | SubmitError::StoreTimeout(_) | SubmitError::Persistence(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

/// Fan-out engine
pub struct FanoutEngine {
    pipeline: Arc<Pipeline>,
    max_content_length: usize,
}

/// The part of a submission that runs detached from the caller.
struct Pipeline {
    resolver: MembershipResolver,
    messages: Arc<dyn MessageRepository>,
    dispatcher: Arc<dyn Dispatcher>,
    lanes: DashMap<i64, Arc<Mutex<()>>>,
    store_timeout: Duration,
}

impl FanoutEngine {
    pub fn new(
        resolver: MembershipResolver,
        messages: Arc<dyn MessageRepository>,
        dispatcher: Arc<dyn Dispatcher>,
        settings: &FanoutSettings,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                resolver,
                messages,
                dispatcher,
                lanes: DashMap::new(),
                store_timeout: Duration::from_millis(settings.persist_timeout_ms),
            }),
            max_content_length: settings.max_content_length,
        }
    }

    /// Persist a message and deliver it to every member's sessions, the
    /// sender's included.
    ///
    /// Succeeds only once the message is durable. Nothing is delivered when
    /// the membership check or the write fails. Delivery failures to
    /// individual sessions never fail the call.
    ///
    /// A valid submission runs on its own task: dropping the returned future
    /// does not stop a persisted message from being delivered.
    #[instrument(skip(self, request), fields(chat_id = request.chat_id, kind = %request.kind))]
    pub async fn submit(
        &self,
        sender_id: i64,
        request: SubmitMessage,
    ) -> Result<MessageResponse, SubmitError> {
        let result = match self.normalize(sender_id, request) {
            Ok(message) => {
                let pipeline = self.pipeline.clone();
                tokio::spawn(async move { pipeline.run(message).await }.in_current_span())
                    .await
                    .unwrap_or_else(|e| Err(SubmitError::Persistence(format!("submission task failed: {e}"))))
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => metrics::record_submission("delivered"),
            Err(e) => {
                metrics::record_submission(e.outcome());
                info!(sender_id, error = %e, "Submission rejected");
            }
        }
        result
    }

    fn normalize(&self, sender_id: i64, request: SubmitMessage) -> Result<NewMessage, SubmitError> {
        let content = request.content.filter(|c| !c.trim().is_empty());
        let attachment_url = request.attachment_url.filter(|u| !u.trim().is_empty());

        if let Some(text) = &content {
            let length = text.chars().count();
            if length > self.max_content_length {
                return Err(SubmitError::Invalid(format!(
                    "content must be at most {} characters",
                    self.max_content_length
                )));
            }
        }

        if request.kind.needs_attachment() {
            if attachment_url.is_none() {
                return Err(SubmitError::Invalid(format!(
                    "{} messages require an attachment_url",
                    request.kind
                )));
            }
        } else if content.is_none() {
            return Err(SubmitError::Invalid("text messages require content".into()));
        }

        Ok(NewMessage {
            chat_id: request.chat_id,
            user_id: sender_id,
            kind: request.kind,
            content,
            attachment_url,
        })
    }
}

impl Pipeline {
    /// Take the chat's lane, run the submission, then drop the lane if no
    /// other submission is waiting on it.
    async fn run(&self, message: NewMessage) -> Result<MessageResponse, SubmitError> {
        let chat_id = message.chat_id;
        let lane = self.lane(chat_id);
        let result = {
            let _turn = lane.lock().await;
            self.submit_in_lane(message).await
        };
        drop(lane);
        self.lanes.remove_if(&chat_id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    fn lane(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.lanes.entry(chat_id).or_default().clone()
    }

    /// Each store round trip is bounded by the store timeout.
    async fn submit_in_lane(&self, message: NewMessage) -> Result<MessageResponse, SubmitError> {
        let chat_id = message.chat_id;

        timeout(self.store_timeout, self.resolver.require_member(chat_id, message.user_id))
            .await
            .map_err(|_| SubmitError::StoreTimeout("membership"))?
            .map_err(|e| SubmitError::from_membership(chat_id, e))?;

        let message_id = timeout(self.store_timeout, self.messages.insert_message(&message))
            .await
            .map_err(|_| SubmitError::PersistTimeout)?
            .map_err(|e| match e {
                AppError::NotFound(_) => SubmitError::ChatNotFound(chat_id),
                other => SubmitError::Persistence(other.to_string()),
            })?;

        let stored = timeout(self.store_timeout, self.messages.fetch_message_with_sender(message_id))
            .await
            .map_err(|_| SubmitError::StoreTimeout("stored message"))?
            .map_err(|e| SubmitError::Persistence(e.to_string()))?
            .ok_or_else(|| SubmitError::Persistence(format!("message {message_id} vanished after insert")))?;
        let view = MessageResponse::from(stored);

        // The message is durable from here on; a failure to resolve recipients
        // skips delivery but the submission still succeeds.
        match timeout(self.store_timeout, self.resolver.resolve(chat_id)).await {
            Ok(Ok(members)) => {
                let report = self
                    .dispatcher
                    .dispatch(
                        Audience::users(members.iter().map(|m| m.user_id)),
                        ServerEvent::NewMessage(view.clone()),
                    )
                    .await;
                log_report(message_id, chat_id, members.len(), report);
            }
            Ok(Err(e)) => {
                error!(message_id, chat_id, error = %e, "Membership resolution failed after persist; message not fanned out");
            }
            Err(_) => {
                error!(message_id, chat_id, "Membership resolution timed out after persist; message not fanned out");
            }
        }

        Ok(view)
    }
}

fn log_report(message_id: i64, chat_id: i64, members: usize, report: DeliveryReport) {
    if report.failed > 0 {
        warn!(
            message_id,
            chat_id,
            members,
            attempted = report.attempted,
            failed = report.failed,
            "Message fanned out with delivery failures"
        );
    } else {
        info!(
            message_id,
            chat_id,
            members,
            attempted = report.attempted,
            relayed = report.relayed,
            "Message fanned out"
        );
    }
}
