//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sync runs (outcomes, durations, tickets seen)
//! - Pass generation, persistence and delivery
//! - External services (ticket source, object storage, mail)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Sync runs
// =============================================================================

/// Sync runs total by outcome.
pub static SYNC_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tailorpass_sync_runs_total", "Total sync runs"),
        &["result"], // "succeeded", "incomplete", "failed", "cancelled"
    )
    .unwrap()
});

/// Sync run duration in seconds.
pub static SYNC_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tailorpass_sync_duration_seconds",
            "Duration of a full sync run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Issued tickets fetched from the source across all runs.
pub static TICKETS_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tailorpass_tickets_fetched_total",
        "Total issued tickets fetched from the ticket source",
    )
    .unwrap()
});

// =============================================================================
// Passes
// =============================================================================

/// Passes generated by channel.
pub static PASSES_GENERATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tailorpass_passes_generated_total", "Total passes generated"),
        &["channel"],
    )
    .unwrap()
});

/// Pass persistence attempts by channel and result.
pub static PASSES_PERSISTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tailorpass_passes_persisted_total",
            "Total pass persistence attempts",
        ),
        &["channel", "result"], // result: "success", "error"
    )
    .unwrap()
});

/// Delivery attempts by method and result.
pub static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tailorpass_deliveries_total", "Total delivery attempts"),
        &["method", "result"],
    )
    .unwrap()
});

/// Check-in mutations by action and result.
pub static CHECK_INS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tailorpass_check_ins_total", "Total check-in mutations"),
        &["action", "result"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tailorpass_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tailorpass_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Sync
        Box::new(SYNC_RUNS.clone()),
        Box::new(SYNC_DURATION.clone()),
        Box::new(TICKETS_FETCHED.clone()),
        // Passes
        Box::new(PASSES_GENERATED.clone()),
        Box::new(PASSES_PERSISTED.clone()),
        Box::new(DELIVERIES.clone()),
        Box::new(CHECK_INS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}

/// Record one external service call.
pub(crate) fn observe_external(service: &str, operation: &str, elapsed_secs: f64, ok: bool) {
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(elapsed_secs);
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if ok { "success" } else { "error" }])
        .inc();
}
