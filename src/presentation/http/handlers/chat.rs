//! Chat Handlers

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{AddMemberRequest, ChatResponse, CreateChatRequest, MemberResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Chats the caller belongs to, with the caller's role
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    Ok(Json(state.chats.list(auth.user_id).await?))
}

/// Create a private, group or channel chat
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let chat = state.chats.create(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// Member list (members only)
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    Ok(Json(state.chats.members(auth.user_id, chat_id).await?))
}

/// Add a member (owners and admins only)
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    let user_id = parse_id(&body.user_id, "user")?;
    let member = state.chats.add_member(auth.user_id, chat_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}
