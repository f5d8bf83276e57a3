//! Health Check Handlers
//!
//! - `GET /health` basic status
//! - `GET /health/live` liveness probe
//! - `GET /health/ready` readiness probe with store, Redis and gateway checks

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the uptime clock to process start.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub store: ServiceHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ServiceHealth>,
    pub gateway: GatewayHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn timed(result: Result<(), String>, started: Instant, degraded_after_ms: u64) -> Self {
        match result {
            Ok(()) => {
                let latency = started.elapsed().as_millis() as u64;
                Self {
                    status: if latency < degraded_after_ms {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Degraded
                    },
                    latency_ms: Some(latency),
                    message: None,
                }
            }
            Err(message) => Self {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(message),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub sessions: usize,
    pub online_users: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// 503 when the store is unreachable; a slow store or a failing Redis only
/// degrades.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let store = ServiceHealth::timed(
        state.repos.health.ping().await.map_err(|e| e.to_string()),
        started,
        100,
    );

    let redis = match state.redis.clone() {
        Some(mut conn) => {
            let started = Instant::now();
            let ping = redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map(|_| ())
                .map_err(|e| format!("Redis connection failed: {}", e));
            Some(ServiceHealth::timed(ping, started, 50))
        }
        None => None,
    };

    let presence = state.hub.presence();
    let gateway = GatewayHealth {
        sessions: presence.session_count(),
        online_users: presence.online_users().len(),
    };

    let status = determine_overall_status(&store, redis.as_ref());
    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            store,
            redis,
            gateway,
        },
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(response))
}

fn determine_overall_status(store: &ServiceHealth, redis: Option<&ServiceHealth>) -> HealthStatus {
    if store.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }
    let redis_ok = redis.map_or(true, |r| r.status == HealthStatus::Healthy);
    if store.status == HealthStatus::Degraded || !redis_ok {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(status: HealthStatus) -> ServiceHealth {
        ServiceHealth {
            status,
            latency_ms: None,
            message: None,
        }
    }

    #[test]
    fn test_overall_status() {
        use HealthStatus::*;
        assert_eq!(determine_overall_status(&health(Healthy), None), Healthy);
        assert_eq!(determine_overall_status(&health(Healthy), Some(&health(Unhealthy))), Degraded);
        assert_eq!(determine_overall_status(&health(Degraded), None), Degraded);
        assert_eq!(determine_overall_status(&health(Unhealthy), Some(&health(Healthy))), Unhealthy);
    }

    #[test]
    fn test_failed_check_carries_message() {
        let check = ServiceHealth::timed(Err("down".into()), Instant::now(), 100);
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.message.as_deref(), Some("down"));
    }
}
