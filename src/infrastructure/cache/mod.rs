//! Redis Module
//!
//! Connection management for the two things Redis is used for: the
//! sliding-window rate limiter and the cross-instance fan-out relay.
//!
//! # Example
//!
//! ```rust,ignore
//! use spectr_server::infrastructure::cache::create_redis_client;
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! ```

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Opens a plain client, used for dedicated pub/sub connections.
pub fn open_client(settings: &RedisSettings) -> Result<Client, redis::RedisError> {
    Client::open(settings.url.as_str())
}

/// Key prefixes shared by every instance.
pub mod keys {
    /// Prefix for rate limiting windows (e.g., "ratelimit:user:42")
    pub const RATE_LIMIT: &str = "ratelimit:";

    #[inline]
    pub fn rate_limit(identifier: impl std::fmt::Display) -> String {
        format!("{}{}", RATE_LIMIT, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(keys::rate_limit("user:42"), "ratelimit:user:42");
    }
}
