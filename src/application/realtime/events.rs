//! Gateway events
//!
//! Every event the server pushes to connected sessions. Serialized adjacently
//! tagged so `t` carries the event name and `d` its payload, which is also the
//! shape of a dispatch frame on the wire.

use serde::{Deserialize, Serialize};

use crate::application::dto::{
    ChatResponse, ContactRequestResponse, ContactResponse, MessageResponse, UserResponse,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresencePayload {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypingPayload {
    pub chat_id: String,
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", content = "d", rename_all = "snake_case")]
pub enum ServerEvent {
    Ready(ReadyPayload),
    NewMessage(MessageResponse),
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    UserTyping(TypingPayload),
    ContactRequest(ContactRequestResponse),
    ContactAccepted(ContactResponse),
    ChatInvite(ChatResponse),
}

impl ServerEvent {
    /// Event name as sent in the `t` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::NewMessage(_) => "new_message",
            Self::UserOnline(_) => "user_online",
            Self::UserOffline(_) => "user_offline",
            Self::UserTyping(_) => "user_typing",
            Self::ContactRequest(_) => "contact_request",
            Self::ContactAccepted(_) => "contact_accepted",
            Self::ChatInvite(_) => "chat_invite",
        }
    }

    /// Payload as sent in the `d` field.
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            Self::Ready(p) => serde_json::to_value(p),
            Self::NewMessage(p) => serde_json::to_value(p),
            Self::UserOnline(p) | Self::UserOffline(p) => serde_json::to_value(p),
            Self::UserTyping(p) => serde_json::to_value(p),
            Self::ContactRequest(p) => serde_json::to_value(p),
            Self::ContactAccepted(p) => serde_json::to_value(p),
            Self::ChatInvite(p) => serde_json::to_value(p),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    pub fn user_online(user_id: i64) -> Self {
        Self::UserOnline(PresencePayload {
            user_id: user_id.to_string(),
        })
    }

    pub fn user_offline(user_id: i64) -> Self {
        Self::UserOffline(PresencePayload {
            user_id: user_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_tagging_matches_name() {
        let event = ServerEvent::user_online(42);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["t"], event.name());
        assert_eq!(json["d"]["user_id"], "42");
        assert_eq!(event.payload(), json["d"]);
    }

    #[test]
    fn test_event_survives_relay_encoding() {
        let event = ServerEvent::UserTyping(TypingPayload {
            chat_id: "7".into(),
            user_id: "1".into(),
            name: "Ann".into(),
        });
        let raw = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, event);
    }
}
