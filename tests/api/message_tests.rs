//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_send_then_read_history_newest_first() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;

    for text in ["one", "two", "three"] {
        let sent = app
            .server
            .post(&format!("/api/v1/chats/{chat_id}/messages"))
            .authorization_bearer(&alice.token)
            .json(&json!({ "content": text }))
            .await;
        sent.assert_status(StatusCode::CREATED);
        let body: Value = sent.json();
        assert_eq!(body["sender"]["display_name"], "Alice");
        assert_eq!(body["type"], "text");
    }

    let history: Value = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&bob.token)
        .await
        .json();
    let contents: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["three", "two", "one"]);

    let before = history[0]["id"].as_str().unwrap();
    let older: Value = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .add_query_param("before", before)
        .add_query_param("limit", 1)
        .authorization_bearer(&bob.token)
        .await
        .json();
    assert_eq!(older.as_array().map(Vec::len), Some(1));
    assert_eq!(older[0]["content"], "two");
}

#[tokio::test]
async fn test_non_member_cannot_send_or_read() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;

    app.server
        .post(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&carol.token)
        .json(&json!({ "content": "let me in" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .get(&format!("/api/v1/chats/{chat_id}/messages"))
        .authorization_bearer(&carol.token)
        .expect_failure()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    assert_eq!(app.store.message_count(chat_id.parse().unwrap()), 0);
}

#[tokio::test]
async fn test_message_shape_validation() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;
    let uri = format!("/api/v1/chats/{chat_id}/messages");

    for body in [
        json!({ "content": "   " }),
        json!({ "type": "image", "content": "no url" }),
        json!({ "content": "x".repeat(4001) }),
    ] {
        app.server
            .post(&uri)
            .authorization_bearer(&alice.token)
            .json(&body)
            .expect_failure()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    app.server
        .post(&uri)
        .authorization_bearer(&alice.token)
        .json(&json!({ "type": "image", "attachment_url": "/uploads/a.png" }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_chat_is_not_found() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    app.server
        .post("/api/v1/chats/999999/messages")
        .authorization_bearer(&alice.token)
        .json(&json!({ "content": "hello?" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(app.store.message_count(999_999), 0);
}
