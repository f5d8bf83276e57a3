//! REST API tests

mod auth_tests;
mod chat_tests;
mod contact_tests;
mod health_tests;
mod message_tests;
mod report_tests;
mod upload_tests;
