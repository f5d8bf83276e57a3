//! Rate Limiting Middleware
//!
//! Redis sliding-window limiter shared by every instance. When Redis is
//! disabled the middleware lets every request through.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::{error, warn};

use crate::config::RateLimitSettings;
use crate::infrastructure::cache::keys;
use crate::presentation::middleware::auth::AuthUser;
use crate::shared::error::{AppError, ErrorResponse};
use crate::startup::AppState;

const SLIDING_WINDOW: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_start = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local window_seconds = tonumber(ARGV[4])

redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
local current_count = redis.call('ZCARD', key)

if current_count < max_requests then
    local member = now_ms .. ':' .. math.random(1000000)
    redis.call('ZADD', key, now_ms, member)
    redis.call('EXPIRE', key, window_seconds + 1)
    return {1, current_count + 1, max_requests}
else
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    local retry_after = 0
    if oldest and #oldest >= 2 then
        retry_after = oldest[2] + (window_seconds * 1000) - now_ms
    end
    return {0, current_count, max_requests, retry_after}
end
"#;

/// Limit for one class of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_seconds: u64,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn max_requests(&self) -> u32 {
        self.requests_per_window + self.burst_allowance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    /// Identity exchange
    Auth,
    Api,
    /// Gateway connection attempts
    Gateway,
}

impl EndpointType {
    /// Auth and gateway limits are fixed; the API limit follows settings.
    pub fn config(&self, settings: &RateLimitSettings) -> RateLimitConfig {
        match self {
            EndpointType::Auth => RateLimitConfig {
                requests_per_window: 10,
                window_seconds: 60,
                burst_allowance: 5,
            },
            EndpointType::Api => RateLimitConfig {
                requests_per_window: (settings.requests_per_second * 60.0).max(1.0) as u32,
                window_seconds: 60,
                burst_allowance: settings.burst_size,
            },
            EndpointType::Gateway => RateLimitConfig {
                requests_per_window: 20,
                window_seconds: 60,
                burst_allowance: 5,
            },
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            EndpointType::Auth => "auth",
            EndpointType::Api => "api",
            EndpointType::Gateway => "gateway",
        }
    }
}

/// Rate limit status returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub retry_after: u64,
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

/// Redis-backed sliding window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    config: RateLimitConfig,
    endpoint_type: EndpointType,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager, endpoint_type: EndpointType, config: RateLimitConfig) -> Self {
        Self {
            redis,
            config,
            endpoint_type,
        }
    }

    /// `Ok` when the request may proceed, `Err` when the caller is over the limit.
    ///
    /// Redis failures let the request through.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        let key = keys::rate_limit(format!("{}:{}", self.endpoint_type.scope(), identifier));
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = (self.config.window_seconds * 1000) as i64;
        let max_requests = self.config.max_requests();
        let reset_at = (now_ms / 1000) + self.config.window_seconds as i64;

        let mut conn = self.redis.clone();
        let result: Vec<i64> = match redis::Script::new(SLIDING_WINDOW)
            .key(&key)
            .arg(now_ms)
            .arg(now_ms - window_ms)
            .arg(max_requests as i64)
            .arg(self.config.window_seconds as i64)
            .invoke_async(&mut conn)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Rate limiter Redis error");
                return Ok(RateLimitInfo {
                    limit: max_requests,
                    remaining: max_requests,
                    reset_at,
                    retry_after: 0,
                });
            }
        };

        let allowed = result.first().copied() == Some(1);
        let count = result.get(1).copied().unwrap_or(0).max(0) as u32;
        let info = RateLimitInfo {
            limit: max_requests,
            remaining: max_requests.saturating_sub(count),
            reset_at,
            retry_after: if allowed {
                0
            } else {
                let retry_ms = result.get(3).copied().unwrap_or(0).max(0);
                ((retry_ms as f64) / 1000.0).ceil() as u64
            },
        };

        if allowed {
            Ok(info)
        } else {
            Err(info)
        }
    }
}

/// Authenticated user first, then proxy headers, then the peer address.
fn extract_identifier(request: &Request, client_ip: Option<IpAddr>) -> String {
    if let Some(auth_user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", auth_user.user_id);
    }

    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|ip| ip.parse::<IpAddr>().ok())
    };

    match header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or(client_ip)
    {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Auth).await
}

pub async fn rate_limit_api(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Api).await
}

pub async fn rate_limit_gateway(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Gateway).await
}

async fn rate_limit_inner(
    state: AppState,
    request: Request,
    next: Next,
    endpoint_type: EndpointType,
) -> Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(request).await;
    };

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identifier = extract_identifier(&request, client_ip);
    let limiter = RateLimiter::new(redis, endpoint_type, endpoint_type.config(&state.settings.rate_limit));

    match limiter.check(&identifier).await {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            warn!(identifier = %identifier, endpoint_type = ?endpoint_type, "Rate limit exceeded");
            rate_limited_response(info)
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_at));
}

fn rate_limited_response(info: RateLimitInfo) -> Response {
    let info = RateLimitInfo { remaining: 0, ..info };
    let error = AppError::RateLimited;
    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: error.code(),
            message: "You are being rate limited. Please slow down.".to_string(),
            errors: None,
        },
        rate_limit: info.clone(),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after));
    add_rate_limit_headers(response.headers_mut(), &info);
    response
}
