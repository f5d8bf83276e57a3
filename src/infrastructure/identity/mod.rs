//! External identity provider
//!
//! Turns a sign-in assertion from the client (a Google ID token) into a
//! verified external identity. The server never trusts a user id supplied by
//! the client; the subject returned here is the only input to account lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::config::AuthSettings;
use crate::shared::error::AppError;

/// Verified identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("assertion rejected: {0}")]
    Rejected(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(msg) => AppError::Unauthorized(msg),
            IdentityError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, assertion: &str) -> Result<ExternalIdentity, IdentityError>;
}

/// Payload of Google's `tokeninfo` endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl TokenInfo {
    fn into_identity(self, client_id: &str) -> Result<ExternalIdentity, IdentityError> {
        if !client_id.is_empty() && self.aud != client_id {
            return Err(IdentityError::Rejected("token issued for another client".into()));
        }
        if self.email_verified.as_deref() == Some("false") {
            return Err(IdentityError::Rejected("email address not verified".into()));
        }
        let email = self
            .email
            .ok_or_else(|| IdentityError::Rejected("token carries no email".into()))?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(ExternalIdentity {
            subject: self.sub,
            email,
            name,
            avatar_url: self.picture,
        })
    }
}

/// Google ID-token verification through the tokeninfo endpoint.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
}

impl GoogleIdentityProvider {
    pub fn new(settings: &AuthSettings) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if settings.google_client_id.is_empty() {
            warn!("auth.google_client_id is empty; token audience will not be checked");
        }

        Ok(Self {
            client,
            tokeninfo_url: settings.google_tokeninfo_url.clone(),
            client_id: settings.google_client_id.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    #[instrument(skip(self, assertion))]
    async fn verify(&self, assertion: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", assertion)])
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if response.status().is_client_error() {
            return Err(IdentityError::Rejected("invalid identity token".into()));
        }
        if !response.status().is_success() {
            return Err(IdentityError::Unavailable(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        info.into_identity(&self.client_id)
    }
}

/// Fixed assertion table, for tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identities: HashMap<String, ExternalIdentity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, assertion: impl Into<String>, identity: ExternalIdentity) -> Self {
        self.identities.insert(assertion.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, assertion: &str) -> Result<ExternalIdentity, IdentityError> {
        self.identities
            .get(assertion)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("invalid identity token".into()))
    }
}
