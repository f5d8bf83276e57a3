//! Contact Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    AcceptedContact, Contact, ContactRepository, ContactStatus, NewContact, PendingRequest,
    UserSummary,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i64,
    user_id: i64,
    contact_id: i64,
    nickname: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl ContactRow {
    fn into_contact(self) -> Contact {
        Contact {
            id: self.id,
            user_id: self.user_id,
            contact_id: self.contact_id,
            nickname: self.nickname,
            status: ContactStatus::from_str(&self.status),
            created_at: self.created_at,
        }
    }
}

/// Contact row joined with the profile of the other party.
#[derive(Debug, sqlx::FromRow)]
struct ContactWithUserRow {
    id: i64,
    user_id: i64,
    contact_id: i64,
    nickname: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    other_id: i64,
    other_display_name: String,
    other_avatar_url: Option<String>,
}

impl ContactWithUserRow {
    fn split(self) -> (Contact, UserSummary) {
        let user = UserSummary {
            id: self.other_id,
            display_name: self.other_display_name,
            avatar_url: self.other_avatar_url,
        };
        let contact = ContactRow {
            id: self.id,
            user_id: self.user_id,
            contact_id: self.contact_id,
            nickname: self.nickname,
            status: self.status,
            created_at: self.created_at,
        }
        .into_contact();
        (contact, user)
    }
}

/// PostgreSQL contact repository implementation.
#[derive(Clone)]
pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn add_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            INSERT INTO contacts (user_id, contact_id, nickname)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, contact_id, nickname, status, created_at
            "#,
        )
        .bind(contact.user_id)
        .bind(contact.contact_id)
        .bind(&contact.nickname)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Contact request already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_contact())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Contact>, AppError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT id, user_id, contact_id, nickname, status, created_at
            FROM contacts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_contact()))
    }

    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Contact>, AppError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT id, user_id, contact_id, nickname, status, created_at
            FROM contacts
            WHERE (user_id = $1 AND contact_id = $2)
               OR (user_id = $2 AND contact_id = $1)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_contact()))
    }

    async fn accept_contact(&self, id: i64) -> Result<Contact, AppError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            UPDATE contacts
            SET status = 'accepted'
            WHERE id = $1
            RETURNING id, user_id, contact_id, nickname, status, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact request not found".into()))?;

        Ok(row.into_contact())
    }

    async fn list_accepted_contacts(&self, user_id: i64) -> Result<Vec<AcceptedContact>, AppError> {
        let rows = sqlx::query_as::<_, ContactWithUserRow>(
            r#"
            SELECT c.id, c.user_id, c.contact_id, c.nickname, c.status, c.created_at,
                   u.id AS other_id,
                   u.display_name AS other_display_name,
                   u.avatar_url AS other_avatar_url
            FROM contacts c
            JOIN users u
              ON u.id = CASE WHEN c.user_id = $1 THEN c.contact_id ELSE c.user_id END
            WHERE (c.user_id = $1 OR c.contact_id = $1)
              AND c.status = 'accepted'
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let (contact, user) = r.split();
                AcceptedContact { contact, user }
            })
            .collect())
    }

    async fn list_pending_requests(&self, user_id: i64) -> Result<Vec<PendingRequest>, AppError> {
        let rows = sqlx::query_as::<_, ContactWithUserRow>(
            r#"
            SELECT c.id, c.user_id, c.contact_id, c.nickname, c.status, c.created_at,
                   u.id AS other_id,
                   u.display_name AS other_display_name,
                   u.avatar_url AS other_avatar_url
            FROM contacts c
            JOIN users u ON u.id = c.user_id
            WHERE c.contact_id = $1 AND c.status = 'pending'
            ORDER BY c.created_at, c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let (contact, requester) = r.split();
                PendingRequest { contact, requester }
            })
            .collect())
    }
}
