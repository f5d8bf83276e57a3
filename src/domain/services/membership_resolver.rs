//! Membership resolution domain service.
//!
//! Answers "who belongs to this chat right now" from the durable store. Every
//! call reads the latest committed membership; nothing is cached, so an invite
//! that committed before a submission is always visible to that submission.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::{ChatRepository, MemberRole, MembershipRepository};
use crate::shared::error::AppError;

/// One entry of a chat's recipient set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedMember {
    pub user_id: i64,
    pub role: MemberRole,
}

/// Resolves chat membership against the repositories.
#[derive(Clone)]
pub struct MembershipResolver {
    chats: Arc<dyn ChatRepository>,
    memberships: Arc<dyn MembershipRepository>,
}

impl MembershipResolver {
    pub fn new(chats: Arc<dyn ChatRepository>, memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { chats, memberships }
    }

    /// Members of `chat_id` ordered by join time, then user id.
    ///
    /// `NotFound` when the chat does not exist. A chat with no members
    /// resolves to an empty set.
    pub async fn resolve(&self, chat_id: i64) -> Result<Vec<ResolvedMember>, AppError> {
        if self.chats.find_by_id(chat_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Chat {} not found", chat_id)));
        }

        let mut members = self.memberships.list_members(chat_id).await?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));

        Ok(members
            .into_iter()
            .map(|m| ResolvedMember {
                user_id: m.user_id,
                role: m.role,
            })
            .collect())
    }

    /// The caller's membership, or `Forbidden` if they are not in the chat.
    ///
    /// `NotFound` takes precedence so a missing chat is reported as such.
    pub async fn require_member(&self, chat_id: i64, user_id: i64) -> Result<ResolvedMember, AppError> {
        if self.chats.find_by_id(chat_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Chat {} not found", chat_id)));
        }

        match self.memberships.find_member(chat_id, user_id).await? {
            Some(m) => Ok(ResolvedMember {
                user_id: m.user_id,
                role: m.role,
            }),
            None => Err(AppError::Forbidden("Not a member of this chat".into())),
        }
    }
}
