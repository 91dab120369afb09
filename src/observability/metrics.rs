//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_requests_total` (counter): requests by method, status
//! - `admission_request_duration_seconds` (histogram): latency distribution
//! - `admission_rate_limited_total` (counter): throttled requests by scope
//! - `admission_auth_denied_total` (counter): auth denials by reason
//! - `admission_notifications_marked_read_total` (counter)
//! - `admission_rate_limit_records` (gauge): live counter records
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("admission_requests_total", &labels).increment(1);
    histogram!("admission_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("admission_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_auth_denied(reason: &'static str) {
    counter!("admission_auth_denied_total", "reason" => reason).increment(1);
}

pub fn record_marked_read(count: u64) {
    counter!("admission_notifications_marked_read_total").increment(count);
}

pub fn record_rate_limit_records(tracked: usize) {
    gauge!("admission_rate_limit_records").set(tracked as f64);
}

/// Middleware that times every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
