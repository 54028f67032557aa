//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the tailorpass server:
//! - HTTP request metrics (latency, counts)
//! - Pass counts by channel and status (collected dynamically)
//! - Sync run state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tailorpass_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tailorpass_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tailorpass_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State gauges (collected dynamically)
// =============================================================================

/// Passes by channel and status.
pub static PASSES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("tailorpass_passes", "Current pass count by channel and status"),
        &["channel", "status"],
    )
    .unwrap()
});

/// Whether a sync run is in flight (1) or not (0).
pub static SYNC_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tailorpass_sync_running",
        "Whether a sync run is currently in progress",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // State
    registry
        .register(Box::new(PASSES_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(SYNC_RUNNING.clone())).unwrap();

    // Core metrics (sync runs, passes, external services)
    for metric in tailorpass_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the store at scrape time.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();
    SYNC_RUNNING.set(if orchestrator.is_running() { 1 } else { 0 });

    for channel in orchestrator.channels() {
        let counts = match orchestrator.store().count_by_status(channel) {
            Ok(counts) => counts,
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to count passes for metrics");
                continue;
            }
        };
        for (status, count) in [
            ("pending", counts.pending),
            ("produced", counts.produced),
            ("sent", counts.sent),
            ("failed", counts.failed),
        ] {
            PASSES_BY_STATUS
                .with_label_values(&[channel.as_str(), status])
                .set(count as i64);
        }
    }
}
