//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the
//! messaging server. All entities map directly to their database tables.
//!
//! - **User**: account created on first external sign-in
//! - **Contact**: directed contact request, visible from both sides once accepted
//! - **Chat**: private, group or channel conversation
//! - **Membership**: a user's place (and role) in a chat
//! - **Message**: immutable chat message
//! - **Report**: abuse report
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. The traits are implemented in the infrastructure layer.

mod chat;
mod contact;
mod membership;
mod message;
mod report;
mod user;

pub use chat::{Chat, ChatKind, ChatRepository, ChatSummary, NewChat};
pub use contact::{
    AcceptedContact, Contact, ContactRepository, ContactStatus, NewContact, PendingRequest,
};
pub use membership::{MemberRole, Membership, MembershipRepository, NewMember};
pub use message::{Message, MessageKind, MessageRepository, MessageWithSender, NewMessage};
pub use report::{NewReport, Report, ReportRepository, ReportStatus};
pub use user::{ProfileUpdate, User, UserRepository, UserRole, UserSummary};

#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use contact::MockContactRepository;
#[cfg(test)]
pub use membership::MockMembershipRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use report::MockReportRepository;
#[cfg(test)]
pub use user::MockUserRepository;
