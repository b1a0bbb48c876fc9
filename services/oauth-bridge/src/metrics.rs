//! Prometheus metrics exposition
//!
//! - `bridge_requests_total` (counter): labels `endpoint`, `method`, `status`
//! - `bridge_request_duration_seconds` (histogram): label `endpoint`
//! - `bridge_token_exchanges_total` (counter): label `outcome`

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "bridge_request_duration_seconds";

/// Upper bounds from 5ms to 30s. The slow end is the token exchange.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
///
/// Durations render as a histogram with `_bucket` lines rather than the
/// exporter's default summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

/// Record a completed request against its route template.
pub fn record_request(endpoint: &str, method: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "bridge_requests_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "endpoint" => endpoint.to_string())
        .record(duration_secs);
}

/// Record the outcome of a callback: `success`, `upstream_error`,
/// `transport_error` or `state_mismatch`.
pub fn record_token_exchange(outcome: &'static str) {
    metrics::counter!("bridge_token_exchanges_total", "outcome" => outcome).increment(1);
}
