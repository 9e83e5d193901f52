//! Prometheus metrics exposition
//!
//! - `auth_tokens_issued_total` (counter): label `outcome`
//! - `auth_oauth_logins_total` (counter): label `outcome`
//! - `auth_request_duration_seconds` (histogram): label `route`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "auth_request_duration_seconds";

/// 1ms to 10s; the slowest route waits on two provider round trips.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `auth_request_duration_seconds` gets explicit buckets so it renders as a
/// histogram (with `_bucket` lines) rather than the default summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)?
        .install_recorder()?;
    Ok(handle)
}

/// Outcome of a `POST /api/user/login` call: `issued`, `rejected` or `error`.
pub fn record_issuance(outcome: &str) {
    metrics::counter!("auth_tokens_issued_total", "outcome" => outcome.to_string()).increment(1);
}

/// Outcome of a provider callback: `success`, `denied`, `correlation_failure` or `error`.
pub fn record_login(outcome: &str) {
    metrics::counter!("auth_oauth_logins_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_request_duration(route: &str, duration_secs: f64) {
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Middleware timing every routed request, labelled by its route template.
pub async fn track_duration(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let start = Instant::now();
    let response = next.run(request).await;
    record_request_duration(&route, start.elapsed().as_secs_f64());
    response
}

/// In-process counters reported by `/health`.
#[derive(Clone)]
pub struct ServiceStats {
    pub started_at: Instant,
    pub tokens_issued: Arc<AtomicU64>,
    pub logins_completed: Arc<AtomicU64>,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            tokens_issued: Arc::new(AtomicU64::new(0)),
            logins_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn token_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_completed(&self) {
        self.logins_completed.fetch_add(1, Ordering::Relaxed);
    }
}
