//! Gateway protocol over a real WebSocket.

use std::time::Duration;

use axum_test::TestWebSocket;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use spectr_server::application::realtime::ServerEvent;
use spectr_server::application::services::issue_access_token;

use crate::common::{TestApp, TestUser};

const WAIT: Duration = Duration::from_secs(2);

/// Open a socket and consume `Hello`.
async fn open(app: &TestApp) -> TestWebSocket {
    let mut ws = app.server.get_websocket("/gateway").await.into_websocket().await;
    let hello = next_op(&mut ws, 10).await;
    assert!(hello["d"]["heartbeat_interval"].as_u64().is_some());
    ws
}

/// Next frame with opcode `op`, skipping any other frame.
async fn next_op(ws: &mut TestWebSocket, op: u64) -> Value {
    let found = tokio::time::timeout(WAIT, async {
        loop {
            let frame: Value = ws.receive_json().await;
            if frame["op"] == op {
                return frame;
            }
        }
    })
    .await;
    found.unwrap_or_else(|_| panic!("no op {op} frame within {WAIT:?}"))
}

/// Next dispatch with event name `t`.
async fn next_dispatch(ws: &mut TestWebSocket, t: &str) -> Value {
    loop {
        let frame = next_op(ws, 0).await;
        if frame["t"] == t {
            return frame;
        }
    }
}

async fn identify(app: &TestApp, user: &TestUser) -> TestWebSocket {
    let mut ws = open(app).await;
    ws.send_json(&json!({ "op": 2, "d": { "token": user.token } })).await;
    let ready = next_dispatch(&mut ws, "ready").await;
    assert_eq!(ready["s"], 1);
    assert_eq!(ready["d"]["user"]["id"], user.id.as_str());
    ws
}

#[tokio::test]
async fn test_ops_before_identify_are_unauthenticated() {
    let app = TestApp::with_gateway();
    let alice = app.sign_in("alice").await;
    let chat_id = app.create_chat(&alice, "group", &[]).await;
    let mut ws = open(&app).await;

    ws.send_json(&json!({ "op": 3, "d": { "chat_id": chat_id, "content": "hi" } })).await;
    let error = next_op(&mut ws, 12).await;
    assert_eq!(error["d"]["code"], "unauthenticated");

    ws.send_json(&json!({ "op": 1 })).await;
    let error = next_op(&mut ws, 12).await;
    assert_eq!(error["d"]["code"], "unauthenticated");

    assert_eq!(app.store.message_count(chat_id.parse().unwrap()), 0);
}

#[tokio::test]
async fn test_garbage_token_is_an_invalid_session() {
    let app = TestApp::with_gateway();
    let mut ws = open(&app).await;

    ws.send_json(&json!({ "op": 2, "d": { "token": "not-a-jwt" } })).await;
    let invalid = next_op(&mut ws, 9).await;
    assert_eq!(invalid["d"], false);
}

#[tokio::test]
async fn test_missing_token_is_an_invalid_session() {
    let app = TestApp::with_gateway();
    let mut ws = open(&app).await;

    ws.send_json(&json!({ "op": 2, "d": {} })).await;
    next_op(&mut ws, 9).await;
}

#[tokio::test]
async fn test_token_signed_with_another_key_is_rejected() {
    let app = TestApp::with_gateway();
    let bob = app.sign_in("bob").await;
    let mut foreign = app.state.settings.jwt.clone();
    foreign.secret = "some-other-deployment-secret-0123456789".into();
    let forged = issue_access_token(&foreign, bob.id()).unwrap();

    let mut ws = open(&app).await;
    ws.send_json(&json!({ "op": 2, "d": { "token": forged.access_token } })).await;
    next_op(&mut ws, 9).await;
    assert!(!app.state.hub.presence().is_online(bob.id()));
}

#[tokio::test]
async fn test_identified_session_gets_heartbeat_ack() {
    let app = TestApp::with_gateway();
    let alice = app.sign_in("alice").await;
    let mut ws = identify(&app, &alice).await;

    ws.send_json(&json!({ "op": 1 })).await;
    let ack = next_op(&mut ws, 11).await;
    assert!(ack.get("d").is_none());
    assert!(app.state.hub.presence().is_online(alice.id()));

    ws.send_json(&json!({ "op": 42 })).await;
    let error = next_op(&mut ws, 12).await;
    assert_eq!(error["d"]["code"], "unknown_op");
}

#[tokio::test]
async fn test_forbidden_send_errors_only_to_sender() {
    let app = TestApp::with_gateway();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;
    let mut bob_s = app.connect(&bob, "b1").await;
    let mut ws = identify(&app, &carol).await;

    ws.send_json(&json!({
        "op": 3,
        "d": { "chat_id": chat_id, "content": "let me in", "nonce": "n-1" }
    }))
    .await;
    let error = next_op(&mut ws, 12).await;
    assert_eq!(error["d"]["code"], "forbidden");
    assert_eq!(error["d"]["nonce"], "n-1");

    assert_eq!(app.store.message_count(chat_id.parse().unwrap()), 0);
    assert!(bob_s.drain("new_message").is_empty());
}

#[tokio::test]
async fn test_send_reaches_senders_other_sessions() {
    let app = TestApp::with_gateway();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;
    let mut alice_phone = app.connect(&alice, "a-phone").await;
    let mut bob_s = app.connect(&bob, "b1").await;
    let mut ws = identify(&app, &alice).await;

    ws.send_json(&json!({
        "op": 3,
        "d": { "chat_id": chat_id, "content": "hello from the laptop", "nonce": "n-2" }
    }))
    .await;

    let echoed = next_dispatch(&mut ws, "new_message").await;
    assert_eq!(echoed["d"]["chat_id"], chat_id.as_str());
    assert_eq!(echoed["d"]["content"], "hello from the laptop");
    let message_id = echoed["d"]["id"].as_str().unwrap().to_string();

    for session in [&mut alice_phone, &mut bob_s] {
        match session.next("new_message").await.as_deref() {
            Some(ServerEvent::NewMessage(message)) => {
                assert_eq!(message.id, message_id);
                assert_eq!(message.sender.id, alice.id);
            }
            other => panic!("expected new_message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_join_chat_requires_membership() {
    let app = TestApp::with_gateway();
    let alice = app.sign_in("alice").await;
    let carol = app.sign_in("carol").await;
    let chat_id = app.create_chat(&alice, "group", &[]).await;
    let mut ws = identify(&app, &carol).await;

    ws.send_json(&json!({ "op": 5, "d": { "chat_id": chat_id } })).await;
    let error = next_op(&mut ws, 12).await;
    assert_eq!(error["d"]["code"], "forbidden");
}
