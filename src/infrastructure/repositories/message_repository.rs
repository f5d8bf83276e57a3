//! Message Repository Implementation
//!
//! PostgreSQL implementation of message storage with keyset pagination.
//!
//! Inserts take a transaction-scoped advisory lock keyed on the chat id before
//! drawing from the id sequence. Two writers on the same chat therefore commit
//! in the order they drew ids, even across server instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    Message, MessageKind, MessageRepository, MessageWithSender, NewMessage, UserSummary,
};
use crate::shared::error::AppError;

/// Upper bound on a single history page.
const MAX_PAGE_SIZE: i64 = 100;

/// Message row joined with the sender's current profile.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    user_id: i64,
    kind: String,
    content: Option<String>,
    attachment_url: Option<String>,
    created_at: DateTime<Utc>,
    sender_display_name: String,
    sender_avatar_url: Option<String>,
}

impl MessageRow {
    fn into_message(self) -> MessageWithSender {
        MessageWithSender {
            sender: UserSummary {
                id: self.user_id,
                display_name: self.sender_display_name,
                avatar_url: self.sender_avatar_url,
            },
            message: Message {
                id: self.id,
                chat_id: self.chat_id,
                user_id: self.user_id,
                kind: MessageKind::from_str(&self.kind),
                content: self.content,
                attachment_url: self.attachment_url,
                created_at: self.created_at,
            },
        }
    }
}

const SELECT_WITH_SENDER: &str = r#"
    SELECT m.id, m.chat_id, m.user_id, m.kind, m.content, m.attachment_url, m.created_at,
           u.display_name AS sender_display_name,
           u.avatar_url AS sender_avatar_url
    FROM messages m
    JOIN users u ON u.id = m.user_id
"#;

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert_message(&self, message: &NewMessage) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(message.chat_id)
            .execute(&mut *tx)
            .await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO messages (chat_id, user_id, kind, content, attachment_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(message.chat_id)
        .bind(message.user_id)
        .bind(message.kind.as_str())
        .bind(&message.content)
        .bind(&message.attachment_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Chat or sender not found".to_string())
            }
            _ => AppError::Database(e),
        })?;

        tx.commit().await?;

        Ok(id)
    }

    async fn fetch_message_with_sender(&self, id: i64) -> Result<Option<MessageWithSender>, AppError> {
        let sql = format!("{SELECT_WITH_SENDER} WHERE m.id = $1");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn list_history(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageWithSender>, AppError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let rows = match before {
            Some(before_id) => {
                let sql = format!(
                    "{SELECT_WITH_SENDER} WHERE m.chat_id = $1 AND m.id < $2 ORDER BY m.id DESC LIMIT $3"
                );
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(chat_id)
                    .bind(before_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "{SELECT_WITH_SENDER} WHERE m.chat_id = $1 ORDER BY m.id DESC LIMIT $2"
                );
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(chat_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}
