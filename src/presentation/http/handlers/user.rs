//! User Handlers

use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::application::dto::{UpdateUserRequest, UserResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users.me(auth.user_id).await?))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.users.update_profile(auth.user_id, body).await?))
}

/// Get user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    Ok(Json(state.users.profile(user_id).await?))
}
