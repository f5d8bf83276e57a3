//! Event dispatch
//!
//! Pushes events to sessions. A push to one session never waits on another:
//! all pushes of one dispatch run concurrently, each bounded by the push
//! timeout, and failures are logged and counted instead of returned.
//!
//! Two implementations:
//! - [`LocalDispatcher`] resolves the audience against this process's
//!   presence registry.
//! - [`RedisDispatcher`] publishes an envelope on a pub/sub channel; every
//!   instance runs [`run_relay`], which hands the envelope to its own local
//!   dispatcher. Presence stays process local and each instance delivers to the
//!   sessions it owns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::events::ServerEvent;
use super::presence::{PresenceRegistry, SessionHandle};
use crate::infrastructure::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("session closed")]
    SessionClosed,

    #[error("push timed out")]
    Timeout,
}

impl DeliveryError {
    fn label(&self) -> &'static str {
        match self {
            Self::SessionClosed => "closed",
            Self::Timeout => "timeout",
        }
    }
}

/// Who an event is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    /// Every session of each listed user
    Users { user_ids: Vec<i64> },
    /// Sessions joined to a chat room, optionally minus one session
    Room { chat_id: i64, except: Option<String> },
    /// Every connected session
    Everyone,
}

impl Audience {
    pub fn users(user_ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Users {
            user_ids: user_ids.into_iter().collect(),
        }
    }

    pub fn user(user_id: i64) -> Self {
        Self::Users {
            user_ids: vec![user_id],
        }
    }
}

/// Result of one dispatch on this instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions a push was attempted to
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Envelope handed to the relay instead of delivered here
    pub relayed: bool,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, audience: Audience, event: ServerEvent) -> DeliveryReport;
}

/// Delivers to sessions in the local presence registry.
#[derive(Clone)]
pub struct LocalDispatcher {
    presence: Arc<PresenceRegistry>,
    push_timeout: Duration,
}

impl LocalDispatcher {
    pub fn new(presence: Arc<PresenceRegistry>, push_timeout: Duration) -> Self {
        Self {
            presence,
            push_timeout,
        }
    }

    fn targets(&self, audience: &Audience) -> Vec<SessionHandle> {
        match audience {
            Audience::Users { user_ids } => user_ids
                .iter()
                .flat_map(|id| self.presence.sessions_for(*id))
                .collect(),
            Audience::Room { chat_id, except } => self
                .presence
                .room_sessions(*chat_id)
                .into_iter()
                .filter(|s| except.as_deref() != Some(s.session_id.as_str()))
                .collect(),
            Audience::Everyone => self.presence.all_sessions(),
        }
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn dispatch(&self, audience: Audience, event: ServerEvent) -> DeliveryReport {
        let targets = self.targets(&audience);
        if targets.is_empty() {
            return DeliveryReport::default();
        }

        let started = Instant::now();
        let name = event.name();
        let event = Arc::new(event);
        let results = join_all(
            targets
                .iter()
                .map(|session| session.push(event.clone(), self.push_timeout)),
        )
        .await;

        let mut report = DeliveryReport {
            attempted: targets.len(),
            ..Default::default()
        };
        for (session, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::record_delivery("ok");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_delivery(e.label());
                    warn!(
                        user_id = session.user_id,
                        session_id = %session.session_id,
                        event = name,
                        error = %e,
                        "Delivery failed"
                    );
                }
            }
        }

        metrics::record_fanout("local", started.elapsed().as_secs_f64());
        debug!(event = name, attempted = report.attempted, failed = report.failed, "Dispatched");
        report
    }
}

/// Envelope published on the relay channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayEnvelope {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// Publishes events for every instance's relay to deliver.
#[derive(Clone)]
pub struct RedisDispatcher {
    conn: ConnectionManager,
    channel: String,
}

impl RedisDispatcher {
    pub fn new(conn: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            conn,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Dispatcher for RedisDispatcher {
    async fn dispatch(&self, audience: Audience, event: ServerEvent) -> DeliveryReport {
        let name = event.name();
        let envelope = RelayEnvelope { audience, event };
        let payload = match serde_json::to_string(&envelope) {
            Ok(p) => p,
            Err(e) => {
                error!(event = name, error = %e, "Failed to encode relay envelope");
                return DeliveryReport::default();
            }
        };

        let mut conn = self.conn.clone();
        let published: Result<i64, _> = conn.publish(&self.channel, payload).await;
        match published {
            Ok(receivers) => {
                debug!(event = name, receivers, "Published to relay");
                DeliveryReport {
                    relayed: true,
                    ..Default::default()
                }
            }
            Err(e) => {
                metrics::record_delivery("relay_error");
                error!(event = name, error = %e, "Failed to publish to relay");
                DeliveryReport::default()
            }
        }
    }
}

/// Subscribe to the relay channel and deliver every envelope locally.
///
/// Envelopes are handled one at a time, in publish order. Reconnects with a
/// capped backoff until the process exits.
pub async fn run_relay(client: redis::Client, channel: String, local: LocalDispatcher) {
    let mut backoff = Duration::from_millis(250);
    loop {
        match relay_once(&client, &channel, &local).await {
            Ok(()) => warn!(channel = %channel, "Relay subscription ended"),
            Err(e) => error!(channel = %channel, error = %e, "Relay subscription failed"),
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(10));
    }
}

async fn relay_once(
    client: &redis::Client,
    channel: &str,
    local: &LocalDispatcher,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!(channel, "Relay subscribed");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Unreadable relay payload");
                continue;
            }
        };
        match serde_json::from_str::<RelayEnvelope>(&payload) {
            Ok(envelope) => {
                local.dispatch(envelope.audience, envelope.event).await;
            }
            Err(e) => warn!(error = %e, "Malformed relay envelope"),
        }
    }
    Ok(())
}
