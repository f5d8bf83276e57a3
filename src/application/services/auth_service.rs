//! Authentication Service
//!
//! Exchanges an identity-provider assertion for a JWT access token, creating
//! the account on first sign-in. The access token is the only identity the
//! HTTP API and the gateway accept.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::JwtSettings;
use crate::domain::{User, UserRepository};
use crate::infrastructure::identity::{IdentityError, IdentityProvider};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Issued access token
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Email already registered to another account")]
    EmailTaken,

    #[error(transparent)]
    Store(#[from] AppError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired | AuthError::InvalidToken => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Identity(e) => e.into(),
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::Store(e) => e,
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Sign a short-lived access token for a user.
pub fn issue_access_token(settings: &JwtSettings, user_id: i64) -> Result<AuthTokens, AuthError> {
    let now = Utc::now();
    let expiry = now + Duration::minutes(settings.access_token_expiry_minutes);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiry.timestamp(),
        iat: now.timestamp(),
        jti: Some(uuid::Uuid::new_v4().to_string()),
    };

    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

    Ok(AuthTokens {
        access_token,
        expires_in: settings.access_token_expiry_minutes * 60,
        token_type: "Bearer".to_string(),
    })
}

/// Validate an access token and return the user id it was issued for.
pub fn verify_access_token(settings: &JwtSettings, token: &str) -> Result<i64, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|_| AuthError::InvalidToken)
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
    ) -> Self {
        Self {
            users,
            identity,
            id_generator,
            jwt_settings,
        }
    }

    /// Verify an external assertion and sign the matching user in.
    #[instrument(skip_all)]
    pub async fn exchange(&self, assertion: &str) -> Result<(User, AuthTokens), AuthError> {
        let identity = self.identity.verify(assertion).await?;

        let user = match self.users.find_by_external_id(&identity.subject).await? {
            Some(user) => user,
            None => {
                let candidate = User::new(
                    self.id_generator.generate(),
                    identity.subject.clone(),
                    identity.email,
                    identity.name,
                    identity.avatar_url,
                );
                match self.users.create_user(&candidate).await {
                    Ok(user) => {
                        info!(user_id = user.id, "Account created on first sign-in");
                        user
                    }
                    // A concurrent first sign-in for the same subject won the insert.
                    Err(AppError::Conflict(_)) => self
                        .users
                        .find_by_external_id(&identity.subject)
                        .await?
                        .ok_or(AuthError::EmailTaken)?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let tokens = issue_access_token(&self.jwt_settings, user.id)?;
        Ok((user, tokens))
    }

    pub fn validate_token(&self, access_token: &str) -> Result<i64, AuthError> {
        verify_access_token(&self.jwt_settings, access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockUserRepository;
    use crate::infrastructure::identity::{ExternalIdentity, StaticIdentityProvider};

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: "0123456789abcdef0123456789abcdef".into(),
            access_token_expiry_minutes: 15,
        }
    }

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            subject: "google-42".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            avatar_url: None,
        }
    }

    fn service(users: MockUserRepository) -> AuthService {
        AuthService::new(
            Arc::new(users),
            Arc::new(StaticIdentityProvider::new().with("good", identity())),
            Arc::new(SnowflakeGenerator::new(1, 1704067200000)),
            settings(),
        )
    }

    #[test]
    fn test_token_round_trip() {
        let tokens = issue_access_token(&settings(), 77).unwrap();
        assert_eq!(verify_access_token(&settings(), &tokens.access_token).unwrap(), 77);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = JwtSettings {
            secret: "ffffffffffffffffffffffffffffffff".into(),
            access_token_expiry_minutes: 15,
        };
        let tokens = issue_access_token(&other, 77).unwrap();
        assert!(matches!(
            verify_access_token(&settings(), &tokens.access_token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_account() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_external_id().returning(|_| Ok(None));
        users
            .expect_create_user()
            .times(1)
            .returning(|user| Ok(user.clone()));

        let (user, tokens) = service(users).exchange("good").await.unwrap();
        assert_eq!(user.external_id, "google-42");
        assert_eq!(user.display_name, "Ada");
        assert_eq!(verify_access_token(&settings(), &tokens.access_token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_bad_assertion_never_touches_store() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_external_id().never();

        let err = service(users).exchange("forged").await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Unauthorized(_)));
    }
}
