//! WebSocket Connection Handler
//!
//! Lifecycle of one gateway connection:
//!
//! 1. send `Hello`, then wait for `Identify` within the identify timeout
//! 2. verify the access token; the token is the only source of identity
//! 3. dispatch `ready`, bind the session and announce presence
//! 4. serve client ops until close, socket error, stalled write or missed
//!    heartbeats
//! 5. unbind exactly once

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::messages::{
    ChatRef, ErrorCode, ErrorPayload, GatewayReceive, GatewaySend, IdentifyPayload, OpCode,
    SendMessagePayload,
};
use super::session::{run_writer, SessionState, WriterExit};
use crate::application::dto::UserResponse;
use crate::application::realtime::{ReadyPayload, ServerEvent, SessionHandle, TypingPayload};
use crate::application::services::verify_access_token;
use crate::domain::User;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Allowance on top of the advertised heartbeat interval.
const HEARTBEAT_GRACE_MS: u64 = 10_000;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_size = state.settings.websocket.max_message_size;
    let max_frame_size = state.settings.websocket.max_frame_size;

    ws.max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

enum IdentifyFailure {
    Closed,
    Rejected(String),
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().to_string();
    let settings = state.settings.websocket.clone();
    let write_timeout = Duration::from_millis(settings.write_timeout_ms);

    tracing::debug!(session_id = %session_id, "New WebSocket connection");

    let (sink, mut stream) = socket.split();
    let (frame_tx, frame_rx) = mpsc::channel::<GatewaySend>(settings.session_buffer);
    let (event_tx, event_rx) = mpsc::channel::<Arc<ServerEvent>>(settings.session_buffer);
    let mut writer = tokio::spawn(run_writer(sink, frame_rx, event_rx, write_timeout));

    if frame_tx
        .send(GatewaySend::hello(settings.heartbeat_interval_ms))
        .await
        .is_err()
    {
        writer.abort();
        return;
    }

    let identify_timeout = Duration::from_secs(settings.identify_timeout_secs);
    let user = match timeout(identify_timeout, await_identify(&mut stream, &frame_tx, &state)).await {
        Ok(Ok(user)) => user,
        Ok(Err(IdentifyFailure::Closed)) => {
            tracing::debug!(session_id = %session_id, "Connection closed before Identify");
            writer.abort();
            return;
        }
        Ok(Err(IdentifyFailure::Rejected(reason))) => {
            tracing::debug!(session_id = %session_id, reason = %reason, "Identify rejected");
            let _ = frame_tx.send(GatewaySend::invalid_session()).await;
            drain_writer(frame_tx, event_tx, writer, write_timeout).await;
            return;
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Identify timeout");
            let _ = frame_tx.send(GatewaySend::invalid_session()).await;
            drain_writer(frame_tx, event_tx, writer, write_timeout).await;
            return;
        }
    };

    let ready = ServerEvent::Ready(ReadyPayload {
        session_id: session_id.clone(),
        user: UserResponse::from_user(user.clone(), true),
    });
    if event_tx.send(Arc::new(ready)).await.is_err() {
        writer.abort();
        return;
    }

    let guard = state
        .hub
        .connect(SessionHandle::new(session_id.clone(), user.id, event_tx))
        .await;
    let mut session = SessionState::new(session_id.clone(), user.id);

    tracing::info!(user_id = user.id, session_id = %session_id, "User connected and identified");

    let heartbeat_timeout = Duration::from_millis(settings.heartbeat_interval_ms + HEARTBEAT_GRACE_MS);
    let mut heartbeat_check = interval(heartbeat_timeout);
    heartbeat_check.tick().await;
    let mut writer_done = false;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(text.as_str(), &mut session, &user, &frame_tx, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            exit = &mut writer => {
                writer_done = true;
                match exit {
                    Ok(WriterExit::Stalled) => {
                        tracing::warn!(session_id = %session_id, "Socket write stalled, closing connection");
                    }
                    other => {
                        tracing::debug!(session_id = %session_id, exit = ?other, "Writer stopped");
                    }
                }
                break;
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(heartbeat_timeout) {
                    tracing::info!(session_id = %session_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }
        }
    }

    guard.close().await;
    drop(frame_tx);
    if !writer_done && timeout(write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!(user_id = user.id, session_id = %session_id, "User disconnected");
}

/// Read frames until a valid `Identify` arrives. Anything else is answered
/// with an `unauthenticated` error.
async fn await_identify(
    stream: &mut SplitStream<WebSocket>,
    frames: &mpsc::Sender<GatewaySend>,
    state: &AppState,
) -> Result<User, IdentifyFailure> {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return Err(IdentifyFailure::Closed),
            Ok(_) => continue,
        };

        let frame = match serde_json::from_str::<GatewayReceive>(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                reply_error(frames, ErrorPayload::new(ErrorCode::InvalidPayload, e.to_string())).await;
                continue;
            }
        };
        if frame.opcode() != Some(OpCode::Identify) {
            reply_error(frames, ErrorPayload::new(ErrorCode::Unauthenticated, "Identify first")).await;
            continue;
        }

        let identify: IdentifyPayload = frame
            .into_payload()
            .map_err(|e| IdentifyFailure::Rejected(format!("Malformed identify: {e}")))?;
        let user_id = verify_access_token(&state.settings.jwt, &identify.token)
            .map_err(|e| IdentifyFailure::Rejected(e.to_string()))?;
        return state
            .users
            .get_user(user_id)
            .await
            .map_err(|e| IdentifyFailure::Rejected(e.to_string()));
    }
    Err(IdentifyFailure::Closed)
}

/// Handle one frame from an identified session. Failures are reported to
/// this session only.
async fn handle_frame(
    text: &str,
    session: &mut SessionState,
    user: &User,
    frames: &mpsc::Sender<GatewaySend>,
    state: &AppState,
) {
    let frame = match serde_json::from_str::<GatewayReceive>(text) {
        Ok(frame) => frame,
        Err(e) => {
            reply_error(frames, ErrorPayload::new(ErrorCode::InvalidPayload, e.to_string())).await;
            return;
        }
    };

    match frame.opcode() {
        Some(OpCode::Heartbeat) => {
            session.heartbeat();
            let _ = frames.send(GatewaySend::heartbeat_ack()).await;
            tracing::trace!(session_id = %session.session_id, "Heartbeat received");
        }

        Some(OpCode::SendMessage) => {
            let payload: SendMessagePayload = match frame.into_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    reply_error(frames, ErrorPayload::new(ErrorCode::InvalidPayload, e.to_string())).await;
                    return;
                }
            };
            let nonce = payload.nonce.clone();
            let chat_id = match parse_id(&payload.chat_id, "chat") {
                Ok(id) => id,
                Err(e) => {
                    reply_error(frames, ErrorPayload::from_app(&e).with_nonce(nonce)).await;
                    return;
                }
            };
            if let Err(e) = state.fanout.submit(user.id, payload.into_submit(chat_id)).await {
                tracing::debug!(session_id = %session.session_id, chat_id, error = %e, "Submission rejected");
                reply_error(frames, ErrorPayload::from_submit(&e).with_nonce(nonce)).await;
            }
        }

        Some(op @ (OpCode::JoinChat | OpCode::Typing)) => {
            let chat_id = match member_chat(frame, user.id, state).await {
                Ok(chat_id) => chat_id,
                Err(payload) => {
                    reply_error(frames, payload).await;
                    return;
                }
            };
            if op == OpCode::JoinChat {
                state.hub.presence().join_chat(&session.session_id, chat_id);
                tracing::debug!(session_id = %session.session_id, chat_id, "Joined chat room");
            } else {
                let payload = TypingPayload {
                    chat_id: chat_id.to_string(),
                    user_id: user.id.to_string(),
                    name: user.display_name.clone(),
                };
                state.hub.typing(chat_id, &session.session_id, payload).await;
            }
        }

        Some(OpCode::Identify) => {
            reply_error(frames, ErrorPayload::new(ErrorCode::InvalidPayload, "Already identified")).await;
        }

        _ => {
            tracing::debug!(session_id = %session.session_id, op = frame.op, "Unknown opcode");
            reply_error(
                frames,
                ErrorPayload::new(ErrorCode::UnknownOp, format!("Unsupported op {}", frame.op)),
            )
            .await;
        }
    }
}

/// Chat id of a `{ chat_id }` payload the user is a member of.
async fn member_chat(frame: GatewayReceive, user_id: i64, state: &AppState) -> Result<i64, ErrorPayload> {
    let chat: ChatRef = frame
        .into_payload()
        .map_err(|e| ErrorPayload::new(ErrorCode::InvalidPayload, e.to_string()))?;
    let chat_id = parse_id(&chat.chat_id, "chat").map_err(|e| ErrorPayload::from_app(&e))?;
    state
        .resolver
        .require_member(chat_id, user_id)
        .await
        .map_err(|e| ErrorPayload::from_app(&e))?;
    Ok(chat_id)
}

async fn reply_error(frames: &mpsc::Sender<GatewaySend>, payload: ErrorPayload) {
    let _ = frames.send(GatewaySend::error(payload)).await;
}

/// Close both queues and give the writer one write timeout to flush.
async fn drain_writer(
    frames: mpsc::Sender<GatewaySend>,
    events: mpsc::Sender<Arc<ServerEvent>>,
    mut writer: tokio::task::JoinHandle<WriterExit>,
    write_timeout: Duration,
) {
    drop(frames);
    drop(events);
    if timeout(write_timeout, &mut writer).await.is_err() {
        writer.abort();
    }
}
