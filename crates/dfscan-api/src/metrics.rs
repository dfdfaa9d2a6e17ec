//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
///
/// Worker job metrics are exported through the same recorder.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "dfscan_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dfscan_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "dfscan_http_requests_in_flight";
    pub const UPLOAD_BYTES: &str = "dfscan_upload_bytes";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_upload(bytes: usize) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Replace job IDs and numeric segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            let replaced = if previous == "jobs" && !segment.is_empty() {
                ":job_id"
            } else if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                ":n"
            } else {
                segment
            };
            previous = segment;
            replaced
        })
        .collect();
    segments.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}
