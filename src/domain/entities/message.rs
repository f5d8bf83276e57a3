//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::shared::error::AppError;

/// Message kinds matching the `messages.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "file" => Self::File,
            _ => Self::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }

    /// Whether this kind carries an attachment instead of (or besides) text.
    pub fn needs_attachment(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY (assigned inside the insert transaction)
/// - chat_id: BIGINT NOT NULL REFERENCES chats(id)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - kind: VARCHAR(16) NOT NULL
/// - content: TEXT NULL
/// - attachment_url: TEXT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// Messages are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    /// Sender
    pub user_id: i64,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for `insert_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
}

/// A message joined with its sender's profile as stored when it was read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: UserSummary,
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a message and return its id.
    ///
    /// Id assignment and the insert are one atomic unit. Ids are globally
    /// increasing, and for a single chat the assignment order is the commit
    /// order.
    async fn insert_message(&self, message: &NewMessage) -> Result<i64, AppError>;

    async fn fetch_message_with_sender(&self, id: i64) -> Result<Option<MessageWithSender>, AppError>;

    /// Newest-first page of a chat's messages with `id < before` when given.
    async fn list_history(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageWithSender>, AppError>;
}
