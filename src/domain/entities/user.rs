//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Account role matching database VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// A user account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - external_id: VARCHAR(255) NOT NULL UNIQUE
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - display_name: VARCHAR(64) NOT NULL
/// - avatar_url: TEXT NULL
/// - role: VARCHAR(16) NOT NULL DEFAULT 'user'
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// `id`, `external_id` and `email` never change once the row exists; only the
/// profile fields are mutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Subject id issued by the external identity provider
    #[serde(skip_serializing)]
    pub external_id: String,

    pub email: String,

    pub display_name: String,

    pub avatar_url: Option<String>,

    pub role: UserRole,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a user for a freshly verified external identity.
    pub fn new(
        id: i64,
        external_id: String,
        email: String,
        display_name: String,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            id,
            external_id,
            email,
            display_name,
            avatar_url,
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Public projection attached to messages and events.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Sender projection carried on delivered messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Mutable profile fields; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none()
    }
}

/// Repository trait for User data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the external id or email is taken.
    async fn create_user(&self, user: &User) -> Result<User, AppError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Apply a profile update and return the stored user.
    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_defaults_to_user() {
        assert_eq!(UserRole::from_str("ADMIN"), UserRole::Admin);
        assert_eq!(UserRole::from_str("moderator"), UserRole::User);
        assert_eq!(UserRole::Admin.as_str(), "admin");
    }

    #[test]
    fn test_external_id_is_not_serialized() {
        let user = User::new(1, "google-123".into(), "a@b.c".into(), "Ann".into(), None);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("external_id").is_none());
        assert_eq!(json["display_name"], "Ann");
    }
}
