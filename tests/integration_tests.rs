//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - REST API endpoint tests
//! - `gateway/` - the WebSocket protocol over a real socket
//! - `realtime/` - fan-out, presence and delivery through the assembled state
//! - `common/` - Shared test utilities

mod api;
mod common;
mod gateway;
mod realtime;
