//! Repository Implementations
//!
//! Concrete implementations of the repository traits defined in the domain
//! layer: one PostgreSQL repository per entity, plus [`MemoryStore`] which
//! implements all of them in process.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use spectr_server::infrastructure::repositories::Repositories;
//!
//! let repos = Repositories::postgres(pool);
//! let user = repos.users.find_by_id(42).await?;
//! ```

pub mod chat_repository;
pub mod contact_repository;
pub mod membership_repository;
pub mod memory;
pub mod message_repository;
pub mod report_repository;
pub mod user_repository;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{
    ChatRepository, ContactRepository, MembershipRepository, MessageRepository, ReportRepository,
    UserRepository,
};
use crate::shared::error::AppError;

pub use chat_repository::PgChatRepository;
pub use contact_repository::PgContactRepository;
pub use membership_repository::PgMembershipRepository;
pub use memory::MemoryStore;
pub use message_repository::PgMessageRepository;
pub use report_repository::PgReportRepository;
pub use user_repository::PgUserRepository;

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;
}

struct PgHealth {
    pool: PgPool,
}

#[async_trait]
impl StoreHealth for PgHealth {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// The persistence gateway as seen by the rest of the application.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub chats: Arc<dyn ChatRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub reports: Arc<dyn ReportRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            contacts: Arc::new(PgContactRepository::new(pool.clone())),
            chats: Arc::new(PgChatRepository::new(pool.clone())),
            memberships: Arc::new(PgMembershipRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            reports: Arc::new(PgReportRepository::new(pool.clone())),
            health: Arc::new(PgHealth { pool }),
        }
    }

    /// Every repository served by the same in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            contacts: store.clone(),
            chats: store.clone(),
            memberships: store.clone(),
            messages: store.clone(),
            reports: store.clone(),
            health: store,
        }
    }
}
