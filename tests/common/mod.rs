//! Common Test Utilities
//!
//! Builds the full application state on the in-memory store with fixed
//! identity assertions, and serves its router through `axum-test`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::{TestServer, TestServerBuilder};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use spectr_server::application::realtime::{ServerEvent, SessionGuard, SessionHandle};
use spectr_server::config::Settings;
use spectr_server::infrastructure::identity::{ExternalIdentity, StaticIdentityProvider};
use spectr_server::infrastructure::notify::LogReportNotifier;
use spectr_server::infrastructure::repositories::{MemoryStore, Repositories};
use spectr_server::infrastructure::storage::LocalFileStorage;
use spectr_server::startup::{AppState, Collaborators};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Users the identity provider knows, by assertion.
pub const KNOWN_USERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> i64 {
        self.id.parse().expect("numeric user id")
    }
}

/// Settings for a memory-backed instance without Redis.
pub fn test_settings() -> Settings {
    let upload_dir = std::env::temp_dir().join(format!("spectr-uploads-{}", uuid::Uuid::new_v4()));
    Settings::builder("test")
        .and_then(|b| b.set_override("jwt.secret", JWT_SECRET))
        .and_then(|b| b.set_override("database.backend", "memory"))
        .and_then(|b| b.set_override("websocket.push_timeout_ms", 50))
        .and_then(|b| b.set_override("fanout.persist_timeout_ms", 1000))
        .and_then(|b| b.set_override("storage.max_upload_bytes", 1024))
        .and_then(|b| b.set_override("storage.upload_dir", upload_dir.to_string_lossy().to_string()))
        .and_then(|b| b.build())
        .and_then(|c| c.try_deserialize::<Settings>())
        .and_then(Settings::validate)
        .expect("test settings")
}

fn identities() -> StaticIdentityProvider {
    KNOWN_USERS
        .iter()
        .fold(StaticIdentityProvider::new(), |provider, name| {
            provider.with(
                assertion(name),
                ExternalIdentity {
                    subject: format!("google-{name}"),
                    email: format!("{name}@example.com"),
                    name: capitalize(name),
                    avatar_url: None,
                },
            )
        })
}

pub fn assertion(name: &str) -> String {
    format!("id-token-{name}")
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(TestServer::builder())
    }

    /// Served over a real HTTP listener so the gateway can upgrade.
    pub fn with_gateway() -> Self {
        Self::build(TestServer::builder().http_transport())
    }

    fn build(builder: TestServerBuilder) -> Self {
        let settings = test_settings();
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalFileStorage::new(&settings.storage));

        let state = AppState::assemble(
            settings,
            Collaborators {
                repos: Repositories::memory(store.clone()),
                redis: None,
                identity: Arc::new(identities()),
                notifier: Arc::new(LogReportNotifier),
                storage,
            },
        );
        let server = builder.build(state.router()).expect("test server");

        Self { server, state, store }
    }

    /// Sign in through the HTTP API.
    pub async fn sign_in(&self, name: &str) -> TestUser {
        let response = self
            .server
            .post("/api/v1/auth/external")
            .json(&json!({ "id_token": assertion(name) }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        TestUser {
            id: body["user"]["id"].as_str().expect("user id").to_string(),
            token: body["access_token"].as_str().expect("token").to_string(),
        }
    }

    /// Create a chat as `owner` with `members` and return its id.
    pub async fn create_chat(&self, owner: &TestUser, kind: &str, members: &[&TestUser]) -> String {
        let member_ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        let response = self
            .server
            .post("/api/v1/chats")
            .authorization_bearer(&owner.token)
            .json(&json!({ "type": kind, "name": "Test chat", "member_ids": member_ids }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().expect("chat id").to_string()
    }

    /// Open a gateway session for `user` directly on the hub.
    pub async fn connect(&self, user: &TestUser, session_id: &str) -> TestSession {
        let (tx, rx) = mpsc::channel(64);
        let guard = self
            .state
            .hub
            .connect(SessionHandle::new(session_id, user.id(), tx))
            .await;
        TestSession { guard, rx }
    }
}

pub struct TestSession {
    pub guard: SessionGuard,
    pub rx: mpsc::Receiver<Arc<ServerEvent>>,
}

impl TestSession {
    /// Events of the given name currently queued, in order.
    pub fn drain(&mut self, name: &str) -> Vec<Arc<ServerEvent>> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if event.name() == name {
                out.push(event);
            }
        }
        out
    }

    /// Wait briefly for the next event with the given name.
    pub async fn next(&mut self, name: &str) -> Option<Arc<ServerEvent>> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(event)) if event.name() == name => return Some(event),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }
}
