//! Prometheus metrics exposition
//!
//! - `md_token_requests_total` (counter): label `status`
//! - `md_token_request_duration_seconds` (histogram): label `status`
//! - `md_token_issued_total` (counter): label `source`
//! - `md_token_source_failures_total` (counter): labels `source`, `reason`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "md_token_request_duration_seconds";

/// Bucket boundaries from 5ms to 30s. The upper end covers a mint call
/// that runs into the configured timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Must be called once, before any metric is emitted.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed token request.
pub fn record_request(status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("md_token_requests_total", "status" => status_str.clone()).increment(1);
    metrics::histogram!(DURATION_METRIC, "status" => status_str).record(duration_secs);
}

/// Record a credential handed out, labelled by the source that produced it.
pub fn record_issued(source: &'static str) {
    metrics::counter!("md_token_issued_total", "source" => source).increment(1);
}

/// Record a failed credential source with a classification label.
pub fn record_source_failure(source: &'static str, reason: &'static str) {
    metrics::counter!(
        "md_token_source_failures_total",
        "source" => source,
        "reason" => reason
    )
    .increment(1);
}
