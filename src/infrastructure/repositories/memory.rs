//! In-memory store
//!
//! Implements every repository trait over one lock-protected state, for local
//! runs without PostgreSQL (`database.backend = "memory"`) and for tests. It
//! keeps the same contracts as the SQL repositories: unique constraints
//! surface as `Conflict`, dangling references as `NotFound`, chat creation is
//! all-or-nothing and message ids are assigned under the same lock that
//! stores the row.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::StoreHealth;
use crate::domain::{
    AcceptedContact, Chat, ChatRepository, ChatSummary, Contact, ContactRepository,
    ContactStatus, Membership, MembershipRepository, Message, MessageRepository,
    MessageWithSender, NewChat, NewContact, NewMember, NewMessage, NewReport, PendingRequest,
    ProfileUpdate, Report, ReportRepository, ReportStatus, User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct State {
    users: HashMap<i64, User>,
    contacts: BTreeMap<i64, Contact>,
    chats: BTreeMap<i64, Chat>,
    members: BTreeMap<(i64, i64), Membership>,
    messages: BTreeMap<i64, Message>,
    reports: Vec<Report>,
    next_contact_id: i64,
    next_chat_id: i64,
    next_message_id: i64,
    next_report_id: i64,
}

impl State {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn with_sender(&self, message: &Message) -> Option<MessageWithSender> {
        self.users.get(&message.user_id).map(|u| MessageWithSender {
            message: message.clone(),
            sender: u.summary(),
        })
    }
}

/// Process-local implementation of the persistence gateway.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages in a chat.
    pub fn message_count(&self, chat_id: i64) -> usize {
        self.state
            .read()
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .count()
    }

    /// Number of stored reports.
    pub fn report_count(&self) -> usize {
        self.state.read().reports.len()
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let mut state = self.state.write();
        let taken = state.users.values().any(|u| {
            u.id == user.id
                || u.external_id == user.external_id
                || u.email.eq_ignore_ascii_case(&user.email)
        });
        if taken {
            return Err(AppError::Conflict(
                "User with this identity or email already exists".into(),
            ));
        }
        state.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User, AppError> {
        let mut state = self.state.write();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        if let Some(name) = &update.display_name {
            user.display_name = name.clone();
        }
        if let Some(avatar) = &update.avatar_url {
            user.avatar_url = Some(avatar.clone());
        }
        Ok(user.clone())
    }
}

#[async_trait]
impl ContactRepository for MemoryStore {
    async fn add_contact(&self, contact: &NewContact) -> Result<Contact, AppError> {
        let mut state = self.state.write();
        if !state.users.contains_key(&contact.user_id) || !state.users.contains_key(&contact.contact_id) {
            return Err(AppError::NotFound("User not found".into()));
        }
        let exists = state
            .contacts
            .values()
            .any(|c| c.user_id == contact.user_id && c.contact_id == contact.contact_id);
        if exists {
            return Err(AppError::Conflict("Contact request already exists".into()));
        }

        let id = State::next(&mut state.next_contact_id);
        let row = Contact {
            id,
            user_id: contact.user_id,
            contact_id: contact.contact_id,
            nickname: contact.nickname.clone(),
            status: ContactStatus::Pending,
            created_at: Utc::now(),
        };
        state.contacts.insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Contact>, AppError> {
        Ok(self.state.read().contacts.get(&id).cloned())
    }

    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Contact>, AppError> {
        Ok(self
            .state
            .read()
            .contacts
            .values()
            .find(|c| c.involves(a) && c.involves(b))
            .cloned())
    }

    async fn accept_contact(&self, id: i64) -> Result<Contact, AppError> {
        let mut state = self.state.write();
        let contact = state
            .contacts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Contact request not found".into()))?;
        contact.status = ContactStatus::Accepted;
        Ok(contact.clone())
    }

    async fn list_accepted_contacts(&self, user_id: i64) -> Result<Vec<AcceptedContact>, AppError> {
        let state = self.state.read();
        Ok(state
            .contacts
            .values()
            .filter(|c| c.status == ContactStatus::Accepted && c.involves(user_id))
            .filter_map(|c| {
                state.users.get(&c.counterpart(user_id)).map(|u| AcceptedContact {
                    contact: c.clone(),
                    user: u.summary(),
                })
            })
            .collect())
    }

    async fn list_pending_requests(&self, user_id: i64) -> Result<Vec<PendingRequest>, AppError> {
        let state = self.state.read();
        Ok(state
            .contacts
            .values()
            .filter(|c| c.status == ContactStatus::Pending && c.contact_id == user_id)
            .filter_map(|c| {
                state.users.get(&c.user_id).map(|u| PendingRequest {
                    contact: c.clone(),
                    requester: u.summary(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn create_chat(&self, chat: &NewChat, members: &[NewMember]) -> Result<Chat, AppError> {
        let mut state = self.state.write();

        if !state.users.contains_key(&chat.created_by) {
            return Err(AppError::NotFound(format!("User {} not found", chat.created_by)));
        }
        if let Some(missing) = members.iter().find(|m| !state.users.contains_key(&m.user_id)) {
            return Err(AppError::NotFound(format!("User {} not found", missing.user_id)));
        }

        let id = State::next(&mut state.next_chat_id);
        let now = Utc::now();
        let row = Chat {
            id,
            kind: chat.kind,
            name: chat.name.clone(),
            avatar_url: chat.avatar_url.clone(),
            created_by: chat.created_by,
            created_at: now,
        };
        state.chats.insert(id, row.clone());

        for member in members {
            state.members.entry((id, member.user_id)).or_insert(Membership {
                chat_id: id,
                user_id: member.user_id,
                role: member.role,
                joined_at: now,
            });
        }

        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        Ok(self.state.read().chats.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ChatSummary>, AppError> {
        let state = self.state.read();
        let mut chats: Vec<ChatSummary> = state
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                state.chats.get(&m.chat_id).map(|c| ChatSummary {
                    chat: c.clone(),
                    role: m.role,
                })
            })
            .collect();
        chats.sort_by(|a, b| {
            b.chat
                .created_at
                .cmp(&a.chat.created_at)
                .then(b.chat.id.cmp(&a.chat.id))
        });
        Ok(chats)
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn add_member(&self, chat_id: i64, member: &NewMember) -> Result<Membership, AppError> {
        let mut state = self.state.write();
        if !state.chats.contains_key(&chat_id) || !state.users.contains_key(&member.user_id) {
            return Err(AppError::NotFound("Chat or user not found".into()));
        }
        if state.members.contains_key(&(chat_id, member.user_id)) {
            return Err(AppError::Conflict("User is already a member of this chat".into()));
        }

        let row = Membership {
            chat_id,
            user_id: member.user_id,
            role: member.role,
            joined_at: Utc::now(),
        };
        state.members.insert((chat_id, member.user_id), row.clone());
        Ok(row)
    }

    async fn list_members(&self, chat_id: i64) -> Result<Vec<Membership>, AppError> {
        let mut members: Vec<Membership> = self
            .state
            .read()
            .members
            .range((chat_id, i64::MIN)..=(chat_id, i64::MAX))
            .map(|(_, m)| m.clone())
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn find_member(&self, chat_id: i64, user_id: i64) -> Result<Option<Membership>, AppError> {
        Ok(self.state.read().members.get(&(chat_id, user_id)).cloned())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert_message(&self, message: &NewMessage) -> Result<i64, AppError> {
        let mut state = self.state.write();
        if !state.chats.contains_key(&message.chat_id) || !state.users.contains_key(&message.user_id) {
            return Err(AppError::NotFound("Chat or sender not found".into()));
        }

        let id = State::next(&mut state.next_message_id);
        state.messages.insert(
            id,
            Message {
                id,
                chat_id: message.chat_id,
                user_id: message.user_id,
                kind: message.kind,
                content: message.content.clone(),
                attachment_url: message.attachment_url.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn fetch_message_with_sender(&self, id: i64) -> Result<Option<MessageWithSender>, AppError> {
        let state = self.state.read();
        Ok(state.messages.get(&id).and_then(|m| state.with_sender(m)))
    }

    async fn list_history(
        &self,
        chat_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageWithSender>, AppError> {
        let state = self.state.read();
        let upper = before.unwrap_or(i64::MAX);
        let limit = limit.clamp(1, 100) as usize;

        Ok(state
            .messages
            .range(..upper)
            .rev()
            .map(|(_, m)| m)
            .filter(|m| m.chat_id == chat_id)
            .filter_map(|m| state.with_sender(m))
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn insert_report(&self, report: &NewReport) -> Result<Report, AppError> {
        let mut state = self.state.write();
        if !state.users.contains_key(&report.reported_user_id) {
            return Err(AppError::NotFound("Reported user or chat not found".into()));
        }
        if let Some(chat_id) = report.chat_id {
            if !state.chats.contains_key(&chat_id) {
                return Err(AppError::NotFound("Reported user or chat not found".into()));
            }
        }

        let row = Report {
            id: State::next(&mut state.next_report_id),
            reporter_id: report.reporter_id,
            reported_user_id: report.reported_user_id,
            chat_id: report.chat_id,
            reason: report.reason.clone(),
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        };
        state.reports.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatKind, MemberRole, MessageKind};
    use pretty_assertions::assert_eq;

    async fn seed_users(store: &MemoryStore, ids: &[i64]) {
        for id in ids {
            store
                .create_user(&User::new(*id, format!("ext-{id}"), format!("u{id}@test.dev"), format!("user {id}"), None))
                .await
                .unwrap();
        }
    }

    fn text(chat_id: i64, user_id: i64, body: &str) -> NewMessage {
        NewMessage {
            chat_id,
            user_id,
            kind: MessageKind::Text,
            content: Some(body.into()),
            attachment_url: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        seed_users(&store, &[1]).await;
        let dup = User::new(2, "other".into(), "U1@test.dev".into(), "x".into(), None);
        assert!(matches!(store.create_user(&dup).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_chat_is_all_or_nothing() {
        let store = MemoryStore::new();
        seed_users(&store, &[1]).await;
        let chat = NewChat { kind: ChatKind::Group, name: None, avatar_url: None, created_by: 1 };
        let members = [NewMember::new(1, MemberRole::Owner), NewMember::new(404, MemberRole::Member)];

        assert!(matches!(store.create_chat(&chat, &members).await, Err(AppError::NotFound(_))));
        assert!(store.list_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_pages_newest_first() {
        let store = MemoryStore::new();
        seed_users(&store, &[1]).await;
        let chat = NewChat { kind: ChatKind::Private, name: None, avatar_url: None, created_by: 1 };
        let chat = store.create_chat(&chat, &[NewMember::new(1, MemberRole::Owner)]).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.insert_message(&text(chat.id, 1, &format!("m{i}"))).await.unwrap());
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let page = store.list_history(chat.id, Some(ids[3]), 2).await.unwrap();
        let got: Vec<i64> = page.iter().map(|m| m.message.id).collect();
        assert_eq!(got, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_insert_into_missing_chat_is_not_found() {
        let store = MemoryStore::new();
        seed_users(&store, &[1]).await;
        let err = store.insert_message(&text(77, 1, "hi")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.message_count(77), 0);
    }
}
