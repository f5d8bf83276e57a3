//! Chat API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_create_group_and_list_with_roles() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;

    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;

    let alice_chats: Value = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(&alice.token)
        .await
        .json();
    assert_eq!(alice_chats[0]["id"], chat_id.as_str());
    assert_eq!(alice_chats[0]["role"], "owner");

    let bob_chats: Value = app
        .server
        .get("/api/v1/chats")
        .authorization_bearer(&bob.token)
        .await
        .json();
    assert_eq!(bob_chats[0]["role"], "member");

    let members: Value = app
        .server
        .get(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&bob.token)
        .await
        .json();
    assert_eq!(members.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_private_chat_needs_exactly_one_other_member() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;

    app.server
        .post("/api/v1/chats")
        .authorization_bearer(&alice.token)
        .json(&json!({ "type": "private", "member_ids": [bob.id, carol.id] }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let chat_id = app.create_chat(&alice, "private", &[&bob]).await;

    app.server
        .post(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&alice.token)
        .json(&json!({ "user_id": carol.id }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_owner_adds_members_and_outsiders_see_nothing() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;
    let carol = app.sign_in("carol").await;
    let chat_id = app.create_chat(&alice, "group", &[&bob]).await;

    app.server
        .post(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&bob.token)
        .json(&json!({ "user_id": carol.id }))
        .expect_failure()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .get(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&carol.token)
        .expect_failure()
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .post(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&alice.token)
        .json(&json!({ "user_id": carol.id }))
        .await
        .assert_status(StatusCode::CREATED);

    app.server
        .post(&format!("/api/v1/chats/{chat_id}/members"))
        .authorization_bearer(&alice.token)
        .json(&json!({ "user_id": carol.id }))
        .expect_failure()
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_chat_id_is_bad_request() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    app.server
        .get("/api/v1/chats/not-a-number/members")
        .authorization_bearer(&alice.token)
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
