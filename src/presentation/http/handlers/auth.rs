//! Authentication Handlers

use axum::{extract::State, Json};

use crate::application::dto::{AuthResponse, ExternalAuthRequest, UserResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Exchange an identity-provider assertion for an access token.
pub async fn external_sign_in(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ExternalAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = state.auth.exchange(&body.id_token).await?;

    Ok(Json(AuthResponse {
        access_token: tokens.access_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
        user: UserResponse::from_user(user, true),
    }))
}
