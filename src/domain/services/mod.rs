//! # Domain Services
//!
//! Business rules that don't belong to a single entity.
//!
//! - **MembershipResolver**: the authoritative recipient set of a chat

mod membership_resolver;

pub use membership_resolver::*;
