//! Authentication Middleware
//!
//! Validates the bearer access token on protected routes and exposes the
//! caller as an [`AuthUser`] request extension.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::application::services::verify_access_token;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

/// Reject requests without a valid access token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let user_id = verify_access_token(&state.settings.jwt, bearer.token())?;
    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}
