//! # Spectr Server Library
//!
//! Realtime messaging backend:
//! - RESTful HTTP API for users, contacts, chats, messages, reports and uploads
//! - WebSocket gateway pushing messages, presence and typing events
//! - PostgreSQL (or an in-memory store) for persistent state
//! - Optional Redis for rate limiting and cross-instance fan-out
//!
//! ## Architecture
//!
//! - **Domain Layer**: Entities, repository traits and the membership resolver
//! - **Application Layer**: Services, DTOs and the realtime core
//!   (presence registry, dispatcher, fan-out engine)
//! - **Infrastructure Layer**: Postgres and in-memory repositories, Redis,
//!   identity provider, report notifier, upload storage, metrics
//! - **Presentation Layer**: HTTP handlers, middleware and the WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! spectr_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities, repository traits, membership resolver
//! +-- application/    Services, DTOs, realtime core
//! +-- infrastructure/ Persistence, cache and external collaborators
//! +-- presentation/   HTTP routes, middleware and WebSocket handlers
//! +-- shared/         Errors, snowflake ids, validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
