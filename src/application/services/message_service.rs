//! Message Service
//!
//! Chat history reads. Submissions go through the fan-out engine.

use std::sync::Arc;

use crate::application::dto::{HistoryQuery, MessageResponse};
use crate::domain::{MembershipResolver, MessageRepository};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;

const MAX_PAGE: i64 = 100;

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    resolver: MembershipResolver,
    default_page: i64,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageRepository>, resolver: MembershipResolver, default_page: i64) -> Self {
        Self {
            messages,
            resolver,
            default_page: default_page.clamp(1, MAX_PAGE),
        }
    }

    /// Newest-first page of a chat's messages, for members only.
    ///
    /// `before` is an exclusive message id cursor; pass the oldest id of the
    /// previous page to continue.
    pub async fn history(
        &self,
        user_id: i64,
        chat_id: i64,
        query: HistoryQuery,
    ) -> Result<Vec<MessageResponse>, AppError> {
        let before = query
            .before
            .as_deref()
            .map(|raw| parse_id(raw, "message"))
            .transpose()?;
        let limit = query.limit.unwrap_or(self.default_page).clamp(1, MAX_PAGE);

        self.resolver.require_member(chat_id, user_id).await?;

        Ok(self
            .messages
            .list_history(chat_id, before, limit)
            .await?
            .into_iter()
            .map(MessageResponse::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ChatKind, ChatRepository, MemberRole, MessageKind, NewChat, NewMember, NewMessage, User,
        UserRepository,
    };
    use crate::infrastructure::repositories::MemoryStore;

    #[tokio::test]
    async fn test_history_pages_backwards_for_members_only() {
        let store = Arc::new(MemoryStore::new());
        for id in [1, 2] {
            store
                .create_user(&User::new(id, format!("e{id}"), format!("{id}@x.io"), format!("U{id}"), None))
                .await
                .unwrap();
        }
        let chat = store
            .create_chat(
                &NewChat { kind: ChatKind::Group, name: Some("g".into()), avatar_url: None, created_by: 1 },
                &[NewMember::new(1, MemberRole::Owner)],
            )
            .await
            .unwrap();
        for n in 0..5 {
            store
                .insert_message(&NewMessage {
                    chat_id: chat.id,
                    user_id: 1,
                    kind: MessageKind::Text,
                    content: Some(format!("m{n}")),
                    attachment_url: None,
                })
                .await
                .unwrap();
        }

        let service = MessageService::new(store.clone(), MembershipResolver::new(store.clone(), store.clone()), 2);
        let first = service.history(1, chat.id, HistoryQuery::default()).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content.as_deref(), Some("m4"));

        let next = service
            .history(1, chat.id, HistoryQuery { before: Some(first[1].id.clone()), limit: Some(10) })
            .await
            .unwrap();
        let contents: Vec<_> = next.iter().filter_map(|m| m.content.as_deref()).collect();
        assert_eq!(contents, vec!["m2", "m1", "m0"]);

        assert!(matches!(
            service.history(2, chat.id, HistoryQuery::default()).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
