//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ProfileUpdate, User, UserRepository, UserRole};
use crate::shared::error::AppError;

/// Database row representation of the users table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    external_id: String,
    email: String,
    display_name: String,
    avatar_url: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            external_id: self.external_id,
            email: self.email,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role: UserRole::from_str(&self.role),
            created_at: self.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, external_id, email, display_name, avatar_url, role, created_at";

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_user()))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, external_id, email, display_name, avatar_url, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.external_id)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(&user.avatar_url)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict("User with this identity or email already exists".to_string())
                }
                _ => AppError::Database(e),
            })?;

        Ok(row.into_user())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError> {
        self.find_where("external_id", external_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_where("LOWER(email)", &email.to_lowercase()).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET \
                display_name = COALESCE($2, display_name), \
                avatar_url = COALESCE($3, avatar_url) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.display_name)
            .bind(&update.avatar_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        Ok(row.into_user())
    }
}
