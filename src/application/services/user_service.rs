//! User Service
//!
//! Profile reads and updates.

use std::sync::Arc;

use crate::application::dto::{UpdateUserRequest, UserResponse};
use crate::domain::{ProfileUpdate, User, UserRepository};
use crate::shared::error::AppError;

pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Own profile, email included.
    pub async fn me(&self, user_id: i64) -> Result<UserResponse, AppError> {
        Ok(UserResponse::from_user(self.get_user(user_id).await?, true))
    }

    /// Someone else's public profile.
    pub async fn profile(&self, user_id: i64) -> Result<UserResponse, AppError> {
        Ok(UserResponse::from_user(self.get_user(user_id).await?, false))
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, AppError> {
        let update = ProfileUpdate {
            display_name: request.display_name.map(|n| n.trim().to_string()),
            avatar_url: request.avatar_url,
        };
        if update.display_name.as_deref() == Some("") {
            return Err(AppError::Validation("Display name cannot be blank".into()));
        }

        let user = if update.is_empty() {
            self.get_user(user_id).await?
        } else {
            self.users.update_profile(user_id, &update).await?
        };
        Ok(UserResponse::from_user(user, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::MemoryStore;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use tokio_test::{assert_err, assert_ok};

    async fn seeded() -> (UserService, User) {
        let store = Arc::new(MemoryStore::new());
        let email: String = SafeEmail().fake();
        let name: String = Name().fake();
        let user = store
            .create_user(&User::new(7, "ext-7".into(), email, name, None))
            .await
            .unwrap();
        (UserService::new(store), user)
    }

    #[tokio::test]
    async fn test_email_only_in_own_profile() {
        let (service, user) = seeded().await;

        let me = assert_ok!(service.me(user.id).await);
        assert_eq!(me.email.as_deref(), Some(user.email.as_str()));

        let public = assert_ok!(service.profile(user.id).await);
        assert_eq!(public.email, None);
        assert_eq!(public.display_name, user.display_name);
    }

    #[tokio::test]
    async fn test_update_trims_and_rejects_blank_names() {
        let (service, user) = seeded().await;

        let updated = assert_ok!(
            service
                .update_profile(
                    user.id,
                    UpdateUserRequest {
                        display_name: Some("  Renamed ".into()),
                        avatar_url: None,
                    },
                )
                .await
        );
        assert_eq!(updated.display_name, "Renamed");

        let blank = service
            .update_profile(
                user.id,
                UpdateUserRequest {
                    display_name: Some("   ".into()),
                    avatar_url: None,
                },
            )
            .await;
        assert!(matches!(assert_err!(blank), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_not_found() {
        let (service, _) = seeded().await;
        assert!(matches!(service.get_user(99).await, Err(AppError::NotFound(_))));
    }
}
