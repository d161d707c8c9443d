//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the assetflow server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Rate limiter rejections
//! - Ticket lifecycle counters and the active ticket gauge (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use assetflow_core::{TicketFilter, TicketStage};

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
            "assetflow_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("assetflow_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "assetflow_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Requests rejected by the rate limiter.
pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "assetflow_rate_limited_requests_total",
        "Total requests rejected by the rate limiter",
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Active tickets by stage (collected dynamically).
pub static TICKETS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("assetflow_tickets_active", "Current active ticket count by stage"),
        &["stage"],
    )
    .unwrap()
});

/// Tickets created through the single-ticket endpoint.
pub static TICKETS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "assetflow_tickets_created_total",
        "Total tickets created since startup",
    )
    .unwrap()
});

/// Tickets soft-deleted.
pub static TICKETS_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "assetflow_tickets_deleted_total",
        "Total tickets deleted since startup",
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
    registry
        .register(Box::new(RATE_LIMITED_TOTAL.clone()))
        .unwrap();

    // Tickets
    registry.register(Box::new(TICKETS_ACTIVE.clone())).unwrap();
    registry
        .register(Box::new(TICKETS_CREATED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TICKETS_DELETED_TOTAL.clone()))
        .unwrap();

    // Core metrics (batch pipeline)
    for metric in assetflow_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the active ticket gauge reflects the store.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let ticket_store = state.ticket_store();

    for stage in TicketStage::ALL {
        let filter = TicketFilter::new().with_stage(stage);
        if let Ok(count) = ticket_store.count(&filter) {
            TICKETS_ACTIVE.with_label_values(&[stage.as_str()]).set(count);
        }
    }

    if let Ok(total) = ticket_store.count(&TicketFilter::new()) {
        TICKETS_ACTIVE.with_label_values(&["all"]).set(total);
    }
}

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"/\d+(/|$)").unwrap()
});

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    NUMERIC_SEGMENT.replace_all(path, "/{id}$1").to_string()
}
