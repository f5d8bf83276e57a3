//! Membership entity and repository trait.
//!
//! Maps to the `chat_members` table. The membership set of a chat is the
//! authoritative recipient list for its messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    #[default]
    Member,
}

impl MemberRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Owners and admins may invite new members.
    pub fn can_invite(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// Maps to the `chat_members` table:
/// - chat_id: BIGINT NOT NULL REFERENCES chats(id)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - role: VARCHAR(16) NOT NULL DEFAULT 'member'
/// - joined_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - PRIMARY KEY (chat_id, user_id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub chat_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMember {
    pub user_id: i64,
    pub role: MemberRole,
}

impl NewMember {
    pub fn new(user_id: i64, role: MemberRole) -> Self {
        Self { user_id, role }
    }
}

/// Repository trait for Membership data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Add a member. `Conflict` if the user is already in the chat.
    async fn add_member(&self, chat_id: i64, member: &NewMember) -> Result<Membership, AppError>;

    /// All members, ordered by `joined_at` then `user_id`.
    async fn list_members(&self, chat_id: i64) -> Result<Vec<Membership>, AppError>;

    async fn find_member(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError>;
}
