//! Authentication API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_external_sign_in_creates_user_once() {
    let app = TestApp::new();

    let first = app.sign_in("alice").await;
    let second = app.sign_in("alice").await;
    assert_eq!(first.id, second.id);

    let me = app
        .server
        .get("/api/v1/users/@me")
        .authorization_bearer(&second.token)
        .await;
    me.assert_status_ok();
    let body: Value = me.json();
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["display_name"], "Alice");
}

#[tokio::test]
async fn test_unknown_assertion_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/external")
        .json(&json!({ "id_token": "forged" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_empty_assertion_fails_validation() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/external")
        .json(&json!({ "id_token": "" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();

    app.server
        .get("/api/v1/chats")
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .get("/api/v1/chats")
        .authorization_bearer("not-a-jwt")
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_and_public_view() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;
    let bob = app.sign_in("bob").await;

    let updated = app
        .server
        .patch("/api/v1/users/@me")
        .authorization_bearer(&alice.token)
        .json(&json!({ "display_name": "  Alice B  " }))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["display_name"], "Alice B");

    let seen_by_bob: Value = app
        .server
        .get(&format!("/api/v1/users/{}", alice.id))
        .authorization_bearer(&bob.token)
        .await
        .json();
    assert_eq!(seen_by_bob["display_name"], "Alice B");
    assert!(seen_by_bob.get("email").map_or(true, Value::is_null));
}
