//! Message Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{HistoryQuery, MessageResponse, SendMessageRequest};
use crate::application::realtime::SubmitMessage;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// History page, newest first
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    Ok(Json(state.messages.history(auth.user_id, chat_id, query).await?))
}

/// Submit a message; it is fanned out to every member's sessions
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    let message = state
        .fanout
        .submit(
            auth.user_id,
            SubmitMessage {
                chat_id,
                kind: body.kind,
                content: body.content,
                attachment_url: body.attachment_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
