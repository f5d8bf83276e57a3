//! Chat Repository Implementation
//!
//! Chat creation writes the chat row and every initial membership in a single
//! transaction, so a failure part way leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Chat, ChatKind, ChatRepository, ChatSummary, MemberRole, NewChat, NewMember};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    kind: String,
    name: Option<String>,
    avatar_url: Option<String>,
    created_by: i64,
    created_at: DateTime<Utc>,
}

impl ChatRow {
    fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            kind: ChatKind::from_str(&self.kind),
            name: self.name,
            avatar_url: self.avatar_url,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatWithRoleRow {
    #[sqlx(flatten)]
    chat: ChatRow,
    role: String,
}

/// PostgreSQL chat repository implementation.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_chat(&self, chat: &NewChat, members: &[NewMember]) -> Result<Chat, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (kind, name, avatar_url, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, kind, name, avatar_url, created_by, created_at
            "#,
        )
        .bind(chat.kind.as_str())
        .bind(&chat.name)
        .bind(&chat.avatar_url)
        .bind(chat.created_by)
        .fetch_one(&mut *tx)
        .await?;

        for member in members {
            sqlx::query(
                r#"
                INSERT INTO chat_members (chat_id, user_id, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (chat_id, user_id) DO NOTHING
                "#,
            )
            .bind(row.id)
            .bind(member.user_id)
            .bind(member.role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    AppError::NotFound(format!("User {} not found", member.user_id))
                }
                _ => AppError::Database(e),
            })?;
        }

        tx.commit().await?;

        Ok(row.into_chat())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, kind, name, avatar_url, created_by, created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_chat()))
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ChatSummary>, AppError> {
        let rows = sqlx::query_as::<_, ChatWithRoleRow>(
            r#"
            SELECT c.id, c.kind, c.name, c.avatar_url, c.created_by, c.created_at, m.role
            FROM chats c
            JOIN chat_members m ON m.chat_id = c.id
            WHERE m.user_id = $1
            ORDER BY c.created_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ChatSummary {
                role: MemberRole::from_str(&r.role),
                chat: r.chat.into_chat(),
            })
            .collect())
    }
}
