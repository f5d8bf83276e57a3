//! Chat entity and repository trait.
//!
//! Maps to the `chats` table. Chats are never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::membership::{MemberRole, NewMember};
use crate::shared::error::AppError;

/// Chat kinds matching the `chats.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// One-to-one conversation
    #[default]
    Private,
    /// Multi-member conversation
    Group,
    /// Broadcast-style chat
    Channel,
}

impl ChatKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "group" => Self::Group,
            "channel" => Self::Channel,
            _ => Self::Private,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

/// Maps to the `chats` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - kind: VARCHAR(16) NOT NULL
/// - name: VARCHAR(100) NULL
/// - avatar_url: TEXT NULL
/// - created_by: BIGINT NOT NULL REFERENCES users(id)
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for `create_chat`; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub kind: ChatKind,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: i64,
}

/// A chat together with the caller's role in it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub role: MemberRole,
}

/// Repository trait for Chat data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create the chat and its initial memberships in one transaction.
    async fn create_chat(&self, chat: &NewChat, members: &[NewMember]) -> Result<Chat, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError>;

    /// Chats `user_id` belongs to, most recently created first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ChatSummary>, AppError>;
}
