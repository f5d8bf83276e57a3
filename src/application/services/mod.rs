//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: identity exchange and JWT access tokens
//! - **UserService**: user profiles
//! - **ContactService**: contact requests
//! - **ChatService**: chats and their members
//! - **MessageService**: chat history
//! - **ReportService**: abuse reports

pub mod auth_service;
pub mod chat_service;
pub mod contact_service;
pub mod message_service;
pub mod report_service;
pub mod user_service;

pub use auth_service::{issue_access_token, verify_access_token, AuthError, AuthService, AuthTokens, Claims};
pub use chat_service::{ChatError, ChatService};
pub use contact_service::{ContactError, ContactService};
pub use message_service::MessageService;
pub use report_service::ReportService;
pub use user_service::UserService;
