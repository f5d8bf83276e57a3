//! Infrastructure Layer
//!
//! Implementations of everything the domain reaches through an interface:
//! - Repositories (PostgreSQL and in-memory)
//! - Redis connections
//! - Upload storage, identity provider, report mail
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod identity;
pub mod metrics;
pub mod notify;
pub mod repositories;
pub mod storage;
