//! Contact Service
//!
//! Contact requests between users. Adding a contact creates a pending request
//! and notifies the target; accepting it notifies the requester.

use std::sync::Arc;

use tracing::info;

use crate::application::dto::{ContactRequestResponse, ContactResponse};
use crate::application::realtime::{RealtimeHub, ServerEvent};
use crate::domain::{
    ContactRepository, ContactStatus, NewContact, PendingRequest, User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("User not found")]
    UserNotFound,

    #[error("Cannot add yourself as a contact")]
    SelfContact,

    #[error("Contact already exists")]
    AlreadyExists,

    #[error("Contact request not found")]
    RequestNotFound,

    #[error("Only the recipient can accept a contact request")]
    NotRecipient,

    #[error("Contact request already accepted")]
    AlreadyAccepted,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ContactError> for AppError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::UserNotFound | ContactError::RequestNotFound => {
                AppError::NotFound(err.to_string())
            }
            ContactError::SelfContact => AppError::BadRequest(err.to_string()),
            ContactError::AlreadyExists | ContactError::AlreadyAccepted => {
                AppError::Conflict(err.to_string())
            }
            ContactError::NotRecipient => AppError::Forbidden(err.to_string()),
            ContactError::Store(e) => e,
        }
    }
}

pub struct ContactService {
    users: Arc<dyn UserRepository>,
    contacts: Arc<dyn ContactRepository>,
    hub: RealtimeHub,
}

impl ContactService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        contacts: Arc<dyn ContactRepository>,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            users,
            contacts,
            hub,
        }
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<ContactResponse>, ContactError> {
        Ok(self
            .contacts
            .list_accepted_contacts(user_id)
            .await?
            .into_iter()
            .map(|entry| ContactResponse::from_accepted(entry, user_id))
            .collect())
    }

    pub async fn pending(&self, user_id: i64) -> Result<Vec<ContactRequestResponse>, ContactError> {
        Ok(self
            .contacts
            .list_pending_requests(user_id)
            .await?
            .into_iter()
            .map(ContactRequestResponse::from)
            .collect())
    }

    /// Send a contact request to the user registered under `email`.
    ///
    /// The nickname defaults to the target's display name.
    pub async fn add(
        &self,
        requester: &User,
        email: &str,
        nickname: Option<String>,
    ) -> Result<ContactResponse, ContactError> {
        let target = self
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(ContactError::UserNotFound)?;
        if target.id == requester.id {
            return Err(ContactError::SelfContact);
        }
        if self.contacts.find_between(requester.id, target.id).await?.is_some() {
            return Err(ContactError::AlreadyExists);
        }

        let nickname = nickname
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| target.display_name.clone());
        let contact = self
            .contacts
            .add_contact(&NewContact {
                user_id: requester.id,
                contact_id: target.id,
                nickname: Some(nickname),
            })
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => ContactError::AlreadyExists,
                other => ContactError::Store(other),
            })?;
        info!(contact_id = contact.id, from = requester.id, to = target.id, "Contact requested");

        let request = PendingRequest {
            contact: contact.clone(),
            requester: requester.summary(),
        };
        self.hub
            .notify_users([target.id], ServerEvent::ContactRequest(request.into()))
            .await;

        Ok(ContactResponse::new(contact, target.summary(), requester.id))
    }

    /// Accept an incoming request. Only its recipient may accept it.
    pub async fn accept(&self, acceptor: &User, contact_id: i64) -> Result<ContactResponse, ContactError> {
        let contact = self
            .contacts
            .find_by_id(contact_id)
            .await?
            .filter(|c| c.involves(acceptor.id))
            .ok_or(ContactError::RequestNotFound)?;
        if contact.contact_id != acceptor.id {
            return Err(ContactError::NotRecipient);
        }
        if contact.status == ContactStatus::Accepted {
            return Err(ContactError::AlreadyAccepted);
        }

        let requester = self
            .users
            .find_by_id(contact.user_id)
            .await?
            .ok_or(ContactError::UserNotFound)?;
        let contact = self.contacts.accept_contact(contact_id).await?;
        info!(contact_id, requester = requester.id, acceptor = acceptor.id, "Contact accepted");

        let for_requester = ContactResponse::new(contact.clone(), acceptor.summary(), requester.id);
        self.hub
            .notify_users([requester.id], ServerEvent::ContactAccepted(for_requester))
            .await;

        Ok(ContactResponse::new(contact, requester.summary(), acceptor.id))
    }
}
