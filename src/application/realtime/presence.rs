//! Presence Registry
//!
//! Which sessions are connected right now, per user and per chat room. Purely
//! in memory and process local. Every operation is a short map update under a
//! shard lock and never awaits.
//!
//! A session is bound once it has identified and unbound exactly once when its
//! connection ends. Only the owning connection mutates its own entry; the rest
//! of the system only reads.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::dispatcher::DeliveryError;
use super::events::ServerEvent;

/// Outbound queue of one session.
pub type EventSender = mpsc::Sender<Arc<ServerEvent>>;

/// Addressable handle of one live connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub user_id: i64,
    sender: EventSender,
}

impl SessionHandle {
    pub fn new(session_id: impl Into<String>, user_id: i64, sender: EventSender) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            sender,
        }
    }

    /// Enqueue an event, waiting at most `timeout` for queue space.
    pub async fn push(&self, event: Arc<ServerEvent>, timeout: Duration) -> Result<(), DeliveryError> {
        self.sender
            .send_timeout(event, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::SessionClosed,
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// The user had no other session before this one
    pub first_session: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnbindOutcome {
    pub user_id: i64,
    /// The user has no session left
    pub last_session: bool,
}

/// Registry of connected sessions.
#[derive(Default)]
pub struct PresenceRegistry {
    /// Active sessions by session_id
    sessions: DashMap<String, SessionHandle>,
    /// User ID to session IDs
    user_sessions: DashMap<i64, HashSet<String>>,
    /// Chat ID to session IDs joined to that chat's room
    rooms: DashMap<i64, HashSet<String>>,
    /// Session ID to joined chat IDs, for cleanup on unbind
    session_rooms: DashMap<String, HashSet<i64>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identified session. Binding is additive: other sessions of
    /// the same user are untouched.
    pub fn bind(&self, handle: SessionHandle) -> BindOutcome {
        let session_id = handle.session_id.clone();
        let user_id = handle.user_id;
        self.sessions.insert(session_id.clone(), handle);

        let mut user_entry = self.user_sessions.entry(user_id).or_default();
        user_entry.insert(session_id.clone());
        let first_session = user_entry.len() == 1;
        drop(user_entry);

        tracing::debug!(user_id, session_id = %session_id, first_session, "Session bound");
        BindOutcome { first_session }
    }

    /// Remove one session. Unknown or already-removed ids are a no-op.
    pub fn unbind(&self, session_id: &str) -> Option<UnbindOutcome> {
        let (_, handle) = self.sessions.remove(session_id)?;
        let user_id = handle.user_id;

        let last_session = match self.user_sessions.entry(user_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(session_id);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => true,
        };

        if let Some((_, chats)) = self.session_rooms.remove(session_id) {
            for chat_id in chats {
                self.leave_room(chat_id, session_id);
            }
        }

        tracing::debug!(user_id, session_id = %session_id, last_session, "Session unbound");
        Some(UnbindOutcome {
            user_id,
            last_session,
        })
    }

    /// Every live session of a user.
    pub fn sessions_for(&self, user_id: i64) -> Vec<SessionHandle> {
        let ids: Vec<String> = match self.user_sessions.get(&user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };
        self.handles(ids)
    }

    /// Subscribe a bound session to a chat room. Returns false for unknown sessions.
    pub fn join_chat(&self, session_id: &str, chat_id: i64) -> bool {
        if !self.sessions.contains_key(session_id) {
            return false;
        }
        self.session_rooms
            .entry(session_id.to_string())
            .or_default()
            .insert(chat_id);
        self.rooms
            .entry(chat_id)
            .or_default()
            .insert(session_id.to_string());

        // The session may have unbound between the check and the inserts.
        if !self.sessions.contains_key(session_id) {
            self.session_rooms.remove(session_id);
            self.leave_room(chat_id, session_id);
            return false;
        }
        true
    }

    /// Sessions joined to a chat room.
    pub fn room_sessions(&self, chat_id: i64) -> Vec<SessionHandle> {
        let ids: Vec<String> = match self.rooms.get(&chat_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };
        self.handles(ids)
    }

    pub fn all_sessions(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.user_sessions.contains_key(&user_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn online_users(&self) -> Vec<i64> {
        self.user_sessions.iter().map(|e| *e.key()).collect()
    }

    fn handles(&self, ids: Vec<String>) -> Vec<SessionHandle> {
        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.value().clone()))
            .collect()
    }

    fn leave_room(&self, chat_id: i64, session_id: &str) {
        if let Entry::Occupied(mut entry) = self.rooms.entry(chat_id) {
            entry.get_mut().remove(session_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}
