//! Membership Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{MemberRole, Membership, MembershipRepository, NewMember};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    chat_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
}

impl MembershipRow {
    fn into_membership(self) -> Membership {
        Membership {
            chat_id: self.chat_id,
            user_id: self.user_id,
            role: MemberRole::from_str(&self.role),
            joined_at: self.joined_at,
        }
    }
}

/// PostgreSQL membership repository implementation.
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn add_member(&self, chat_id: i64, member: &NewMember) -> Result<Membership, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            INSERT INTO chat_members (chat_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING chat_id, user_id, role, joined_at
            "#,
        )
        .bind(chat_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User is already a member of this chat".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Chat or user not found".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_membership())
    }

    async fn list_members(&self, chat_id: i64) -> Result<Vec<Membership>, AppError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT chat_id, user_id, role, joined_at
            FROM chat_members
            WHERE chat_id = $1
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_membership()).collect())
    }

    async fn find_member(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT chat_id, user_id, role, joined_at
            FROM chat_members
            WHERE chat_id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_membership()))
    }
}
