//! Prometheus metrics for core components.
//!
//! This module provides metrics for the batch upsert pipeline: runs per
//! source format, row outcomes and run duration.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

// =============================================================================
// Batch Pipeline
// =============================================================================

/// Batch runs total by source format.
pub static BATCH_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("assetflow_batch_runs_total", "Total batch upsert runs"),
        &["source"], // "csv", "json"
    )
    .unwrap()
});

/// Rows processed by outcome.
pub static BATCH_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("assetflow_batch_rows_total", "Total batch rows processed"),
        &["outcome"], // "applied", "skipped", "dropped"
    )
    .unwrap()
});

/// Batch run duration in seconds.
pub static BATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "assetflow_batch_duration_seconds",
            "Duration of a batch upsert run",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(BATCH_RUNS.clone()),
        Box::new(BATCH_ROWS.clone()),
        Box::new(BATCH_DURATION.clone()),
    ]
}
