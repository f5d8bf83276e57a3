//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, cors::create_cors_layer, create_trace_layer, rate_limit_api,
    rate_limit_auth, rate_limit_gateway, track_http_metrics, SecurityHeadersLayer,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway endpoint with its own connection rate limit
        .route(
            "/gateway",
            get(ws_handler).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_gateway,
            )),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .nest_service(
            &settings.storage.public_prefix,
            ServeDir::new(&settings.storage.upload_dir),
        )
        .layer(middleware::from_fn(track_http_metrics))
        .layer(create_trace_layer())
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(&settings.cors))
        // Outermost so every response carries the headers
        .layer(SecurityHeadersLayer::for_environment(&settings.environment))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .merge(protected_routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_api))
}

/// Authentication routes (public, with stricter rate limiting)
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/external", post(handlers::auth::external_sign_in))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_auth))
}

/// Everything behind a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    let upload_limit = state.settings.storage.max_upload_bytes + UPLOAD_OVERHEAD_BYTES;

    Router::new()
        .route(
            "/users/@me",
            get(handlers::user::get_current_user).patch(handlers::user::update_current_user),
        )
        .route("/users/{user_id}", get(handlers::user::get_user))
        .route(
            "/contacts",
            get(handlers::contact::list_contacts).post(handlers::contact::add_contact),
        )
        .route("/contacts/requests", get(handlers::contact::list_requests))
        .route(
            "/contacts/{contact_id}/accept",
            post(handlers::contact::accept_contact),
        )
        .route(
            "/chats",
            get(handlers::chat::list_chats).post(handlers::chat::create_chat),
        )
        .route(
            "/chats/{chat_id}/members",
            get(handlers::chat::list_members).post(handlers::chat::add_member),
        )
        .route(
            "/chats/{chat_id}/messages",
            get(handlers::message::get_messages).post(handlers::message::send_message),
        )
        .route("/reports", post(handlers::report::create_report))
        .route(
            "/uploads",
            post(handlers::upload::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
