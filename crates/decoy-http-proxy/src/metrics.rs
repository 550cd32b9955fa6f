//! Prometheus metrics for decoy-http-proxy.
//!
//! Tracks mode dispatch, simulation matching, middleware and upstream activity.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total number of requests dispatched
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_requests_total",
        "Total number of requests dispatched by the proxy",
        &["mode", "status"]
    )
    .unwrap();

    /// Simulation lookups
    pub static ref MATCH_RESULTS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_match_results_total",
        "Total number of simulation lookups by result",
        &["result"]  // result: hit|miss
    )
    .unwrap();

    /// Patterns that failed to compile or evaluate
    pub static ref MATCHER_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "decoy_matcher_errors_total",
        "Total number of malformed matcher patterns encountered",
        &["matcher"]
    )
    .unwrap();

    /// Middleware invocation duration
    pub static ref MIDDLEWARE_DURATION_MS: HistogramVec = register_histogram_vec!(
        "decoy_middleware_duration_ms",
        "Histogram of middleware execution time in milliseconds",
        &["outcome"],  // outcome: ok|middleware_unavailable|middleware_timeout|middleware_invalid_output
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap();

    /// Injected delay in milliseconds, labelled by the rule pattern so
    /// cardinality follows configuration rather than traffic
    pub static ref DELAY_INJECTED_MS: HistogramVec = register_histogram_vec!(
        "decoy_delay_injected_ms",
        "Histogram of injected response delay in milliseconds",
        &["rule"],  // rule: destination pattern, or "response" for fixedDelay only
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();

    /// Upstream request duration
    pub static ref UPSTREAM_REQUEST_DURATION_MS: HistogramVec = register_histogram_vec!(
        "decoy_upstream_request_duration_ms",
        "Duration of real upstream requests",
        &["method", "status"]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(mode: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[mode, &status.to_string()])
        .inc();
}

pub fn record_match(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    MATCH_RESULTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_matcher_error(matcher: &str) {
    MATCHER_ERRORS_TOTAL.with_label_values(&[matcher]).inc();
}

pub fn record_middleware(outcome: &str, duration_ms: f64) {
    MIDDLEWARE_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn record_delay(rule: &str, duration_ms: u64) {
    DELAY_INJECTED_MS
        .with_label_values(&[rule])
        .observe(duration_ms as f64);
}

pub fn record_upstream_duration(method: &str, status: u16, duration_ms: f64) {
    UPSTREAM_REQUEST_DURATION_MS
        .with_label_values(&[method, &status.to_string()])
        .observe(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        record_request("simulate", 200);
        record_match(true);
        record_match(false);

        let metrics = collect_metrics();
        assert!(metrics.contains("decoy_requests_total"));
        assert!(metrics.contains("decoy_match_results_total"));
    }

    #[test]
    fn test_middleware_histogram() {
        record_middleware(crate::ErrorKind::MiddlewareTimeout.as_str(), 1000.0);

        let metrics = collect_metrics();
        assert!(metrics.contains("decoy_middleware_duration_ms"));
        assert!(metrics.contains("outcome=\"middleware_timeout\""));
    }

    #[test]
    fn test_delay_and_upstream() {
        record_delay("host1", 100);
        record_upstream_duration("GET", 200, 12.5);
        record_matcher_error("regexMatch");

        let metrics = collect_metrics();
        assert!(metrics.contains("decoy_delay_injected_ms"));
        assert!(metrics.contains("decoy_upstream_request_duration_ms"));
        assert!(metrics.contains("decoy_matcher_errors_total"));
    }
}
