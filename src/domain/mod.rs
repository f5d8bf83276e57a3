//! # Domain Layer
//!
//! The core business model of the messaging server. It is independent of any
//! external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Contact, Chat, Membership, Message, Report)
//! - **services**: Domain services (membership resolution)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
