//! Contact Handlers

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{AddContactRequest, ContactRequestResponse, ContactResponse};
use crate::presentation::http::extractors::ValidatedJson;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Accepted contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    Ok(Json(state.contacts.list(auth.user_id).await?))
}

/// Pending incoming requests
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ContactRequestResponse>>, AppError> {
    Ok(Json(state.contacts.pending(auth.user_id).await?))
}

/// Send a contact request by email
pub async fn add_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<AddContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let requester = state.users.get_user(auth.user_id).await?;
    let contact = state
        .contacts
        .add(&requester, &body.email, body.nickname)
        .await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// Accept an incoming request
pub async fn accept_contact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(contact_id): Path<String>,
) -> Result<Json<ContactResponse>, AppError> {
    let contact_id = parse_id(&contact_id, "contact")?;
    let acceptor = state.users.get_user(auth.user_id).await?;
    Ok(Json(state.contacts.accept(&acceptor, contact_id).await?))
}
