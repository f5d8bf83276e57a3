//! Response DTOs
//!
//! Data structures for API response bodies and gateway event payloads.
//! Snowflake ids exceed the 53-bit integer range of JSON clients, so every id
//! is sent as a string.

use serde::{Deserialize, Serialize};

use crate::domain::{
    AcceptedContact, Chat, ChatSummary, Contact, Membership, MessageWithSender, PendingRequest,
    Report, User, UserSummary,
};
use crate::infrastructure::storage::StoredFile;

/// External sign-in response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// User response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: User, include_email: bool) -> Self {
        Self {
            id: user.id.to_string(),
            email: if include_email { Some(user.email) } else { None },
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            role: user.role.as_str().to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Partial user attached to messages, contacts and events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummaryResponse {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<UserSummary> for UserSummaryResponse {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id.to_string(),
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Message with its sender projection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    pub created_at: String,
    pub sender: UserSummaryResponse,
}

impl From<MessageWithSender> for MessageResponse {
    fn from(m: MessageWithSender) -> Self {
        Self {
            id: m.message.id.to_string(),
            chat_id: m.message.chat_id.to_string(),
            user_id: m.message.user_id.to_string(),
            kind: m.message.kind.as_str().to_string(),
            content: m.message.content,
            attachment_url: m.message.attachment_url,
            created_at: m.message.created_at.to_rfc3339(),
            sender: m.sender.into(),
        }
    }
}

/// Accepted contact as seen by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactResponse {
    pub id: String,
    pub user: UserSummaryResponse,
    pub nickname: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl ContactResponse {
    /// `nickname` is the requester's label, so it is only shown to the requester.
    pub fn new(contact: Contact, user: UserSummary, viewer_id: i64) -> Self {
        Self {
            id: contact.id.to_string(),
            nickname: if contact.user_id == viewer_id {
                contact.nickname
            } else {
                None
            },
            status: contact.status.as_str().to_string(),
            created_at: contact.created_at.to_rfc3339(),
            user: user.into(),
        }
    }

    pub fn from_accepted(entry: AcceptedContact, viewer_id: i64) -> Self {
        Self::new(entry.contact, entry.user, viewer_id)
    }
}

/// Incoming contact request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactRequestResponse {
    pub id: String,
    pub requester: UserSummaryResponse,
    pub created_at: String,
}

impl From<PendingRequest> for ContactRequestResponse {
    fn from(request: PendingRequest) -> Self {
        Self {
            id: request.contact.id.to_string(),
            requester: request.requester.into(),
            created_at: request.contact.created_at.to_rfc3339(),
        }
    }
}

/// Chat response; `role` is the caller's role when known
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id.to_string(),
            kind: chat.kind.as_str().to_string(),
            name: chat.name,
            avatar_url: chat.avatar_url,
            created_by: chat.created_by.to_string(),
            created_at: chat.created_at.to_rfc3339(),
            role: None,
        }
    }
}

impl From<ChatSummary> for ChatResponse {
    fn from(summary: ChatSummary) -> Self {
        let role = summary.role.as_str().to_string();
        Self {
            role: Some(role),
            ..ChatResponse::from(summary.chat)
        }
    }
}

/// Chat member response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberResponse {
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
}

impl From<Membership> for MemberResponse {
    fn from(member: Membership) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            role: member.role.as_str().to_string(),
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

/// Filed report
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub status: String,
    pub created_at: String,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            id: report.id.to_string(),
            status: report.status.as_str().to_string(),
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

/// Stored upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub kind: String,
    pub size: usize,
    pub content_type: String,
    pub file_name: String,
}

impl From<StoredFile> for UploadResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            url: file.url,
            kind: file.kind.as_str().to_string(),
            size: file.size,
            content_type: file.content_type,
            file_name: file.file_name,
        }
    }
}
