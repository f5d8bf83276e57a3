//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod auth;
pub mod chat;
pub mod contact;
pub mod health;
pub mod message;
pub mod report;
pub mod upload;
pub mod user;
