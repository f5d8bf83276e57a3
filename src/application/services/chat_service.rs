//! Chat Service
//!
//! Chat creation, listing and membership management. Every change to a
//! chat's member set is pushed to the users it adds as `chat_invite`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::application::dto::{ChatResponse, CreateChatRequest, MemberResponse};
use crate::application::realtime::{RealtimeHub, ServerEvent};
use crate::domain::{
    Chat, ChatKind, ChatRepository, ChatSummary, MemberRole, MembershipRepository,
    MembershipResolver, NewChat, NewMember, UserRepository,
};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat not found")]
    NotFound,

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("A private chat needs exactly one other member")]
    PrivateChatSize,

    #[error("Group and channel chats need a name")]
    NameRequired,

    #[error("Members cannot be added to a private chat")]
    PrivateChatClosed,

    #[error("Only owners and admins can add members")]
    CannotInvite,

    #[error("User is already a member of this chat")]
    AlreadyMember,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound | ChatError::UserNotFound(_) => AppError::NotFound(err.to_string()),
            ChatError::PrivateChatSize | ChatError::NameRequired | ChatError::PrivateChatClosed => {
                AppError::BadRequest(err.to_string())
            }
            ChatError::CannotInvite => AppError::Forbidden(err.to_string()),
            ChatError::AlreadyMember => AppError::Conflict(err.to_string()),
            ChatError::Store(e) => e,
        }
    }
}

pub struct ChatService {
    users: Arc<dyn UserRepository>,
    chats: Arc<dyn ChatRepository>,
    memberships: Arc<dyn MembershipRepository>,
    resolver: MembershipResolver,
    hub: RealtimeHub,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        chats: Arc<dyn ChatRepository>,
        memberships: Arc<dyn MembershipRepository>,
        resolver: MembershipResolver,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            users,
            chats,
            memberships,
            resolver,
            hub,
        }
    }

    /// Create a chat owned by `creator_id` with the requested members.
    ///
    /// The chat and every membership are written in one unit.
    pub async fn create(
        &self,
        creator_id: i64,
        request: CreateChatRequest,
    ) -> Result<ChatResponse, ChatError> {
        let mut invitees = BTreeSet::new();
        for raw in &request.member_ids {
            let id = parse_id(raw, "user")?;
            if id != creator_id {
                invitees.insert(id);
            }
        }

        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        match request.kind {
            ChatKind::Private if invitees.len() != 1 => return Err(ChatError::PrivateChatSize),
            ChatKind::Group | ChatKind::Channel if name.is_none() => {
                return Err(ChatError::NameRequired)
            }
            _ => {}
        }

        for id in &invitees {
            if self.users.find_by_id(*id).await?.is_none() {
                return Err(ChatError::UserNotFound(*id));
            }
        }

        let mut members = vec![NewMember::new(creator_id, MemberRole::Owner)];
        members.extend(invitees.iter().map(|id| NewMember::new(*id, MemberRole::Member)));

        let chat = self
            .chats
            .create_chat(
                &NewChat {
                    kind: request.kind,
                    name,
                    avatar_url: request.avatar_url,
                    created_by: creator_id,
                },
                &members,
            )
            .await?;
        info!(chat_id = chat.id, kind = chat.kind.as_str(), members = members.len(), "Chat created");

        self.invite_event(&chat, MemberRole::Member, invitees).await;

        Ok(ChatSummary {
            chat,
            role: MemberRole::Owner,
        }
        .into())
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<ChatResponse>, ChatError> {
        Ok(self
            .chats
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(ChatResponse::from)
            .collect())
    }

    /// Member list, visible to members only.
    pub async fn members(&self, user_id: i64, chat_id: i64) -> Result<Vec<MemberResponse>, ChatError> {
        self.resolver.require_member(chat_id, user_id).await?;
        let mut members = self.memberships.list_members(chat_id).await?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members.into_iter().map(MemberResponse::from).collect())
    }

    /// Add a user to a group or channel. Owners and admins only.
    pub async fn add_member(
        &self,
        inviter_id: i64,
        chat_id: i64,
        user_id: i64,
    ) -> Result<MemberResponse, ChatError> {
        let inviter = self.resolver.require_member(chat_id, inviter_id).await?;
        if !inviter.role.can_invite() {
            return Err(ChatError::CannotInvite);
        }
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await?
            .ok_or(ChatError::NotFound)?;
        if chat.kind == ChatKind::Private {
            return Err(ChatError::PrivateChatClosed);
        }
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(ChatError::UserNotFound(user_id));
        }

        let membership = self
            .memberships
            .add_member(chat_id, &NewMember::new(user_id, MemberRole::Member))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => ChatError::AlreadyMember,
                other => ChatError::Store(other),
            })?;
        info!(chat_id, user_id, inviter_id, "Member added");

        self.invite_event(&chat, membership.role, [user_id]).await;
        Ok(membership.into())
    }

    async fn invite_event(&self, chat: &Chat, role: MemberRole, user_ids: impl IntoIterator<Item = i64>) {
        let event = ServerEvent::ChatInvite(
            ChatSummary {
                chat: chat.clone(),
                role,
            }
            .into(),
        );
        self.hub.notify_users(user_ids, event).await;
    }
}
