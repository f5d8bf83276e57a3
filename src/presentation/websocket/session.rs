//! WebSocket Session Management
//!
//! Per-connection state and the writer task that owns the socket's sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::messages::GatewaySend;
use crate::application::realtime::ServerEvent;

/// WebSocket session state
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub user_id: i64,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(session_id: String, user_id: i64) -> Self {
        Self {
            session_id,
            user_id,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }
}

/// Why the writer stopped.
#[derive(Debug, PartialEq, Eq)]
pub enum WriterExit {
    /// Both queues closed; a close frame was sent
    Drained,
    /// The peer is gone or a write failed
    SocketError,
    /// One write exceeded the write timeout
    Stalled,
}

/// Drain control frames and dispatched events into the socket.
///
/// Events get consecutive sequence numbers in the order they are written.
/// A single write that takes longer than `write_timeout` ends the writer, and
/// with it the connection.
pub async fn run_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<GatewaySend>,
    mut events: mpsc::Receiver<Arc<ServerEvent>>,
    write_timeout: Duration,
) -> WriterExit {
    let mut sequence = 0u64;

    loop {
        let frame = tokio::select! {
            biased;
            Some(frame) = frames.recv() => frame,
            Some(event) = events.recv() => {
                sequence += 1;
                GatewaySend::dispatch(&event, sequence)
            }
            else => break,
        };

        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize frame");
                continue;
            }
        };

        match timeout(write_timeout, sink.send(Message::Text(text.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return WriterExit::SocketError,
            Err(_) => return WriterExit::Stalled,
        }
    }

    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
    WriterExit::Drained
}
