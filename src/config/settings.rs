//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Persistence backend configuration
    pub database: DatabaseSettings,

    /// Redis configuration (rate limiting, distributed fan-out)
    pub redis: RedisSettings,

    /// JWT access token settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings (user identities)
    pub snowflake: SnowflakeSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket gateway configuration
    pub websocket: WebSocketSettings,

    /// Message fan-out configuration
    pub fanout: FanoutSettings,

    /// Upload storage configuration
    pub storage: StorageSettings,

    /// External identity provider configuration
    pub auth: AuthSettings,

    /// Abuse report notification configuration
    pub report: ReportSettings,

    /// Log output format ("pretty" or "json")
    pub log_format: String,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// Which persistence backend to compose at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Backend to use; `memory` keeps everything in-process (local runs, tests)
    pub backend: DatabaseBackend,

    /// Database connection URL (required for `postgres`)
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Run embedded migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Whether Redis is used at all
    pub enabled: bool,

    /// Redis connection URL
    #[serde(default)]
    pub url: String,

    /// Pub/sub channel carrying fan-out envelopes between instances
    pub fanout_channel: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-31)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum requests per second
    pub requests_per_second: f64,

    /// Burst size (bucket capacity)
    pub burst_size: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Heartbeat interval in milliseconds (default: 45000)
    pub heartbeat_interval_ms: u64,

    /// Connection timeout for identify in seconds (default: 30)
    pub identify_timeout_secs: u64,

    /// Outbound queue depth per session
    pub session_buffer: usize,

    /// Upper bound for enqueueing one event to one session
    pub push_timeout_ms: u64,

    /// Upper bound for one socket write before the connection is dropped
    pub write_timeout_ms: u64,

    /// Relay fan-out through Redis pub/sub so several instances share presence
    pub distributed: bool,
}

/// Fan-out engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutSettings {
    /// Upper bound for persisting one message
    pub persist_timeout_ms: u64,

    /// Maximum message content length in characters
    pub max_content_length: usize,

    /// Default page size for history fetches
    pub history_page_size: i64,
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded files are written to
    pub upload_dir: String,

    /// URL prefix the upload directory is served under
    pub public_prefix: String,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

/// External identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// OAuth client id the ID token audience must match
    #[serde(default)]
    pub google_client_id: String,

    /// Token verification endpoint
    pub google_tokeninfo_url: String,
}

/// Report notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    /// Address reports are mailed to (and sent from)
    #[serde(default)]
    pub admin_email: String,

    /// SMTP relay host; when empty reports are only logged
    #[serde(default)]
    pub smtp_host: String,

    #[serde(default)]
    pub smtp_username: String,

    #[serde(default)]
    pub smtp_password: String,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the loaded values are inconsistent (see [`Settings::validate`]).
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .set_override_option(
                "auth.google_client_id",
                std::env::var("GOOGLE_CLIENT_ID").ok(),
            )?
            .set_override_option("report.admin_email", std::env::var("ADMIN_EMAIL").ok())?
            .set_override_option(
                "report.smtp_password",
                std::env::var("ADMIN_EMAIL_PASSWORD").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate())
    }

    /// Configuration builder pre-populated with every default.
    pub fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("log_format", "pretty")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.backend", "postgres")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("redis.enabled", false)?
            .set_default("redis.fanout_channel", "spectr:fanout")?
            .set_default("jwt.access_token_expiry_minutes", 60 * 24)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1704067200000_u64)?
            .set_default("rate_limit.requests_per_second", 10.0)?
            .set_default("rate_limit.burst_size", 30)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.heartbeat_interval_ms", 45000_i64)?
            .set_default("websocket.identify_timeout_secs", 30_i64)?
            .set_default("websocket.session_buffer", 256_i64)?
            .set_default("websocket.push_timeout_ms", 250_i64)?
            .set_default("websocket.write_timeout_ms", 5000_i64)?
            .set_default("websocket.distributed", false)?
            .set_default("fanout.persist_timeout_ms", 5000_i64)?
            .set_default("fanout.max_content_length", 4000_i64)?
            .set_default("fanout.history_page_size", 50_i64)?
            .set_default("storage.upload_dir", "public/uploads")?
            .set_default("storage.public_prefix", "/uploads")?
            .set_default("storage.max_upload_bytes", 25 * 1024 * 1024_i64)?
            .set_default(
                "auth.google_tokeninfo_url",
                "https://oauth2.googleapis.com/tokeninfo",
            )
    }

    /// Reject settings that would start a misconfigured server.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.database.backend == DatabaseBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url is required for the postgres backend".into(),
            ));
        }
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err(ConfigError::Message(
                "redis.url is required when redis is enabled".into(),
            ));
        }
        if self.websocket.distributed && !self.redis.enabled {
            return Err(ConfigError::Message(
                "websocket.distributed requires redis.enabled".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
