//! Contact entity and repository trait.
//!
//! Maps to the `contacts` table. A row is directed: `user_id` asked to add
//! `contact_id`. Once accepted the relationship is visible from both sides.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    Pending,
    Accepted,
}

impl ContactStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "accepted" => Self::Accepted,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: i64,

    /// Requester
    pub user_id: i64,

    /// Target of the request
    pub contact_id: i64,

    /// Label chosen by the requester
    pub nickname: Option<String>,

    pub status: ContactStatus,

    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// The other side of the relationship as seen by `user_id`.
    pub fn counterpart(&self, user_id: i64) -> i64 {
        if self.user_id == user_id {
            self.contact_id
        } else {
            self.user_id
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.user_id == user_id || self.contact_id == user_id
    }
}

/// Input for a new contact request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub user_id: i64,
    pub contact_id: i64,
    pub nickname: Option<String>,
}

/// An accepted contact from one user's point of view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AcceptedContact {
    pub contact: Contact,
    pub user: UserSummary,
}

/// An incoming request awaiting the target's decision.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PendingRequest {
    pub contact: Contact,
    pub requester: UserSummary,
}

/// Repository trait for Contact data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Insert a pending request. `Conflict` if the same direction already exists.
    async fn add_contact(&self, contact: &NewContact) -> Result<Contact, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Contact>, AppError>;

    /// Any row linking the two users, in either direction.
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Contact>, AppError>;

    /// Mark a request accepted and return the updated row.
    async fn accept_contact(&self, id: i64) -> Result<Contact, AppError>;

    /// Accepted contacts of `user_id` in either direction, oldest first.
    async fn list_accepted_contacts(&self, user_id: i64) -> Result<Vec<AcceptedContact>, AppError>;

    /// Pending requests addressed to `user_id`, oldest first.
    async fn list_pending_requests(&self, user_id: i64) -> Result<Vec<PendingRequest>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart() {
        let contact = Contact {
            id: 1,
            user_id: 10,
            contact_id: 20,
            nickname: None,
            status: ContactStatus::Accepted,
            created_at: Utc::now(),
        };
        assert_eq!(contact.counterpart(10), 20);
        assert_eq!(contact.counterpart(20), 10);
        assert!(contact.involves(20));
        assert!(!contact.involves(30));
    }
}
