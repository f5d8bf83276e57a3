//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method, route and status
//! - Active gateway sessions
//! - Message submissions by outcome
//! - Per-session deliveries by outcome
//! - Fan-out latency (persisted message to last push attempted)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "spectr";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request latency in seconds")
            .namespace(NAMESPACE)
            .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Identified gateway sessions bound in the presence registry
pub static GATEWAY_SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("gateway_sessions_active", "Number of identified gateway sessions")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create GATEWAY_SESSIONS_ACTIVE metric")
});

/// Submissions by outcome: "delivered", "forbidden", "not_found", "invalid", "failed"
pub static MESSAGES_SUBMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_submitted_total", "Message submissions by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create MESSAGES_SUBMITTED_TOTAL metric")
});

/// Session pushes by outcome: "ok", "closed", "timeout"
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deliveries_total", "Per-session event pushes by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create DELIVERIES_TOTAL metric")
});

pub static FANOUT_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];
    HistogramVec::new(
        HistogramOpts::new("fanout_duration_seconds", "Time spent pushing one message to all sessions")
            .namespace(NAMESPACE)
            .buckets(buckets),
        &["mode"],
    )
    .expect("Failed to create FANOUT_DURATION_SECONDS metric")
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(GATEWAY_SESSIONS_ACTIVE.clone()))
        .expect("Failed to register GATEWAY_SESSIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_SUBMITTED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SUBMITTED_TOTAL");
    registry
        .register(Box::new(DELIVERIES_TOTAL.clone()))
        .expect("Failed to register DELIVERIES_TOTAL");
    registry
        .register(Box::new(FANOUT_DURATION_SECONDS.clone()))
        .expect("Failed to register FANOUT_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_submission(outcome: &str) {
    MESSAGES_SUBMITTED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_delivery(outcome: &str) {
    DELIVERIES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_fanout(mode: &str, duration_secs: f64) {
    FANOUT_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(duration_secs);
}

pub fn session_opened() {
    GATEWAY_SESSIONS_ACTIVE.inc();
}

pub fn session_closed() {
    GATEWAY_SESSIONS_ACTIVE.dec();
}
