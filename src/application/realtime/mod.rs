//! Realtime core
//!
//! - **events**: server-to-client event vocabulary
//! - **presence**: who is connected, per user and per chat room
//! - **dispatcher**: pushes events to sessions, locally or through the Redis relay
//! - **fanout**: durable message submission followed by delivery to members
//!
//! [`RealtimeHub`] ties presence and dispatch together for connection lifecycle
//! and for the non-message events the HTTP services emit.

mod dispatcher;
mod events;
mod fanout;
mod presence;

pub use dispatcher::*;
pub use events::*;
pub use fanout::*;
pub use presence::*;

use std::sync::Arc;

use tracing::{debug, info};

use crate::infrastructure::metrics;

/// Presence plus dispatch.
#[derive(Clone)]
pub struct RealtimeHub {
    presence: Arc<PresenceRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl RealtimeHub {
    pub fn new(presence: Arc<PresenceRegistry>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            presence,
            dispatcher,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Bind an identified session. The returned guard unbinds it when dropped.
    pub async fn connect(&self, handle: SessionHandle) -> SessionGuard {
        let user_id = handle.user_id;
        let session_id = handle.session_id.clone();
        let outcome = self.presence.bind(handle);
        metrics::session_opened();

        if outcome.first_session {
            info!(user_id, session_id = %session_id, "User online");
            self.dispatcher
                .dispatch(Audience::Everyone, ServerEvent::user_online(user_id))
                .await;
        }

        SessionGuard {
            hub: self.clone(),
            session_id,
            released: false,
        }
    }

    /// Push an event to every session of the given users.
    pub async fn notify_users(&self, user_ids: impl IntoIterator<Item = i64>, event: ServerEvent) {
        let event_name = event.name();
        let report = self.dispatcher.dispatch(Audience::users(user_ids), event).await;
        debug!(event = event_name, delivered = report.delivered, "Notified users");
    }

    /// Typing indicator to the chat room, minus the typing session.
    pub async fn typing(&self, chat_id: i64, session_id: &str, payload: TypingPayload) {
        self.dispatcher
            .dispatch(
                Audience::Room {
                    chat_id,
                    except: Some(session_id.to_string()),
                },
                ServerEvent::UserTyping(payload),
            )
            .await;
    }

    async fn disconnect(&self, session_id: &str) {
        if let Some(outcome) = self.release(session_id) {
            if outcome.last_session {
                self.broadcast_offline(outcome.user_id).await;
            }
        }
    }

    fn release(&self, session_id: &str) -> Option<UnbindOutcome> {
        let outcome = self.presence.unbind(session_id)?;
        metrics::session_closed();
        Some(outcome)
    }

    async fn broadcast_offline(&self, user_id: i64) {
        info!(user_id, "User offline");
        self.dispatcher
            .dispatch(Audience::Everyone, ServerEvent::user_offline(user_id))
            .await;
    }
}

/// Owns one bound session.
///
/// Call [`SessionGuard::close`] on a clean shutdown. When the guard is dropped
/// without it (panic, aborted task) the session is still unbound and the
/// offline broadcast runs on a spawned task.
pub struct SessionGuard {
    hub: RealtimeHub,
    session_id: String,
    released: bool,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn close(mut self) {
        self.released = true;
        self.hub.disconnect(&self.session_id).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Some(outcome) = self.hub.release(&self.session_id) else {
            return;
        };
        if !outcome.last_session {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let hub = self.hub.clone();
            runtime.spawn(async move { hub.broadcast_offline(outcome.user_id).await });
        }
    }
}
