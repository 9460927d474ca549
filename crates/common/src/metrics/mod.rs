//! Metrics and observability utilities
//!
//! Metric descriptions and recording helpers for batch fetches and tree
//! builds. Without an installed recorder every helper is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all citenet metrics
pub const METRICS_PREFIX: &str = "citenet";

/// Register all metric descriptions
pub fn register_metrics() {
    // Fetch metrics
    describe_counter!(
        format!("{}_fetch_items_total", METRICS_PREFIX),
        Unit::Count,
        "Identifier resolutions by outcome"
    );

    describe_counter!(
        format!("{}_fetch_rounds_total", METRICS_PREFIX),
        Unit::Count,
        "Retry rounds started"
    );

    describe_histogram!(
        format!("{}_fetch_backoff_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Backoff waited before a retry round"
    );

    describe_histogram!(
        format!("{}_fetch_batch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Wall time of a whole batch"
    );

    // Graph metrics
    describe_counter!(
        format!("{}_graph_records_fetched_total", METRICS_PREFIX),
        Unit::Count,
        "Records fetched from the citation database"
    );

    describe_histogram!(
        format!("{}_graph_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Citation tree build latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a single identifier resolution
pub fn record_fetch_item(success: bool) {
    let status = if success { "success" } else { "failed" };

    counter!(
        format!("{}_fetch_items_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record the start of a retry round
pub fn record_fetch_round(backoff_secs: f64) {
    counter!(format!("{}_fetch_rounds_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_fetch_backoff_seconds", METRICS_PREFIX)).record(backoff_secs);
}

/// Helper to record a record lookup made while building a tree
pub fn record_graph_fetch() {
    counter!(format!("{}_graph_records_fetched_total", METRICS_PREFIX)).increment(1);
}

/// Times an operation and records it into a histogram on `finish`
pub struct Timer {
    start: Instant,
    metric: &'static str,
}

impl Timer {
    /// Time a whole batch fetch
    pub fn batch() -> Self {
        Self {
            start: Instant::now(),
            metric: "fetch_batch_duration_seconds",
        }
    }

    /// Time a citation tree build
    pub fn graph_build() -> Self {
        Self {
            start: Instant::now(),
            metric: "graph_build_duration_seconds",
        }
    }

    /// Record the elapsed time and return it in seconds
    pub fn finish(self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!(format!("{}_{}", METRICS_PREFIX, self.metric)).record(elapsed);
        elapsed
    }
}
