//! Upload API Tests

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_upload_then_fetch() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"fake png bytes".to_vec())
            .file_name("cat.png")
            .mime_type("image/png"),
    );
    let response = app
        .server
        .post("/api/v1/uploads")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["kind"], "image");
    assert_eq!(body["size"], 14);

    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    let fetched = app.server.get(url).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.as_bytes().as_ref(), b"fake png bytes");
}

#[tokio::test]
async fn test_html_upload_is_not_served_as_html() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"<script>alert(1)</script>".to_vec())
            .file_name("page.html")
            .mime_type("text/html"),
    );
    let response = app
        .server
        .post("/api/v1/uploads")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let url = response.json::<Value>()["url"].as_str().unwrap().to_string();
    assert!(!url.ends_with(".html"));

    let fetched = app.server.get(&url).await;
    fetched.assert_status_ok();
    let content_type = fetched.header("content-type");
    assert!(!content_type.to_str().unwrap().contains("html"));
    assert_eq!(fetched.header("x-content-type-options"), "nosniff");
}

#[tokio::test]
async fn test_upload_limits() {
    let app = TestApp::new();
    let alice = app.sign_in("alice").await;

    let too_big = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; 4096]).file_name("big.bin"),
    );
    app.server
        .post("/api/v1/uploads")
        .authorization_bearer(&alice.token)
        .multipart(too_big)
        .expect_failure()
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

    let over_body_limit = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; 128 * 1024]).file_name("huge.bin"),
    );
    app.server
        .post("/api/v1/uploads")
        .authorization_bearer(&alice.token)
        .multipart(over_body_limit)
        .expect_failure()
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

    let no_file = MultipartForm::new().add_text("note", "hello");
    app.server
        .post("/api/v1/uploads")
        .authorization_bearer(&alice.token)
        .multipart(no_file)
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
