//! Request DTOs
//!
//! Data structures for API request bodies. Ids arrive as strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{ChatKind, MessageKind};

/// Exchange an identity-provider assertion for an access token
#[derive(Debug, Deserialize, Validate)]
pub struct ExternalAuthRequest {
    #[validate(length(min = 1, message = "Assertion is required"))]
    pub id_token: String,
}

/// Update user request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: Option<String>,

    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar_url: Option<String>,
}

/// Add a contact by email
#[derive(Debug, Deserialize, Validate)]
pub struct AddContactRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 64, message = "Nickname must be at most 64 characters"))]
    pub nickname: Option<String>,
}

/// Create chat request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[serde(rename = "type", default)]
    pub kind: ChatKind,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub avatar_url: Option<String>,

    /// Members besides the creator
    #[serde(default)]
    #[validate(length(max = 500, message = "Too many members"))]
    pub member_ids: Vec<String>,
}

/// Invite a user to a chat
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
}

/// Submit a message over HTTP
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,

    pub content: Option<String>,

    pub attachment_url: Option<String>,
}

/// History query parameters
#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub before: Option<String>,
    pub limit: Option<i64>,
}

/// File an abuse report
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub reported_user_id: String,

    pub chat_id: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Reason must be 1-2000 characters"))]
    pub reason: String,
}
