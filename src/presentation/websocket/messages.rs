//! WebSocket Message Types
//!
//! Every frame is `{ op, d, s, t }`. Dispatch frames carry the event name in
//! `t` and a per-session sequence number in `s`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::realtime::{ServerEvent, SubmitError, SubmitMessage};
use crate::domain::MessageKind;
use crate::shared::error::AppError;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch
    Dispatch = 0,
    /// Heartbeat
    Heartbeat = 1,
    /// Identify
    Identify = 2,
    /// Submit a message
    SendMessage = 3,
    /// Typing indicator
    Typing = 4,
    /// Subscribe to a chat room's typing events
    JoinChat = 5,
    /// Invalid session
    InvalidSession = 9,
    /// Hello
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
    /// Request failed
    Error = 12,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::SendMessage,
            4 => Self::Typing,
            5 => Self::JoinChat,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            12 => Self::Error,
            _ => return None,
        })
    }
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

impl GatewayReceive {
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    /// Decode `d` into the payload type of this opcode.
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.d.unwrap_or(serde_json::Value::Null))
    }
}

/// Outgoing gateway message
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    fn op(op: OpCode, d: Option<serde_json::Value>) -> Self {
        Self {
            op: op as u8,
            d,
            s: None,
            t: None,
        }
    }

    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::op(
            OpCode::Hello,
            Some(serde_json::json!({ "heartbeat_interval": heartbeat_interval })),
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self::op(OpCode::HeartbeatAck, None)
    }

    pub fn invalid_session() -> Self {
        Self::op(OpCode::InvalidSession, Some(serde_json::Value::Bool(false)))
    }

    pub fn dispatch(event: &ServerEvent, sequence: u64) -> Self {
        Self {
            op: OpCode::Dispatch as u8,
            d: Some(event.payload()),
            s: Some(sequence),
            t: Some(event.name().to_string()),
        }
    }

    pub fn error(payload: ErrorPayload) -> Self {
        Self::op(OpCode::Error, serde_json::to_value(payload).ok())
    }
}

/// Identify payload (op 2)
#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

/// Send message payload (op 3)
#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub chat_id: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub content: Option<String>,
    pub attachment_url: Option<String>,
    /// Echoed back on failure so the client can match it to its request
    pub nonce: Option<String>,
}

impl SendMessagePayload {
    pub fn into_submit(self, chat_id: i64) -> SubmitMessage {
        SubmitMessage {
            chat_id,
            kind: self.kind,
            content: self.content,
            attachment_url: self.attachment_url,
        }
    }
}

/// Typing (op 4) and join chat (op 5) payload
#[derive(Debug, Deserialize)]
pub struct ChatRef {
    pub chat_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthenticated,
    InvalidPayload,
    UnknownOp,
    NotFound,
    Forbidden,
    InvalidMessage,
    SendFailed,
    Internal,
}

/// Error payload (op 12)
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn from_submit(err: &SubmitError) -> Self {
        match err {
            SubmitError::ChatNotFound(_) => Self::new(ErrorCode::NotFound, err.to_string()),
            SubmitError::Forbidden => Self::new(ErrorCode::Forbidden, err.to_string()),
            SubmitError::Invalid(msg) => Self::new(ErrorCode::InvalidMessage, msg.clone()),
            SubmitError::PersistTimeout | SubmitError::StoreTimeout(_) | SubmitError::Persistence(_) => {
                Self::new(ErrorCode::SendFailed, "Failed to send message")
            }
        }
    }

    pub fn from_app(err: &AppError) -> Self {
        match err {
            AppError::NotFound(_) => Self::new(ErrorCode::NotFound, err.client_message()),
            AppError::Forbidden(_) => Self::new(ErrorCode::Forbidden, err.client_message()),
            AppError::BadRequest(_) | AppError::Validation(_) => {
                Self::new(ErrorCode::InvalidPayload, err.client_message())
            }
            _ => Self::new(ErrorCode::Internal, err.client_message()),
        }
    }
}
