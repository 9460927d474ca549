//! Progress hooks for batch fetches
//!
//! The engine reports to a `FetchObserver` at fixed points: batch start,
//! each retry round, each item start/success/failure, batch end. The default
//! `TracingObserver` turns these into structured log events and metrics.
//! Positions are 1-based indices into the submitted batch and are purely
//! informational.

use citenet_common::metrics;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why one resolution attempt failed
///
/// Only observers see this; the returned items record a plain failed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Still processing after the poll budget was spent
    StillProcessing { polls: u32 },
    /// Any status other than success or processing
    Status(u16),
    /// Request never produced a response
    Transport(String),
    /// Success status with a body that is not JSON
    MalformedPayload(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::StillProcessing { polls } => {
                write!(f, "still processing after {} poll(s)", polls)
            }
            FailureReason::Status(status) => write!(f, "unexpected status {}", status),
            FailureReason::Transport(message) => write!(f, "transport error: {}", message),
            FailureReason::MalformedPayload(message) => write!(f, "bad JSON returned: {}", message),
        }
    }
}

/// End-of-batch totals
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Retry rounds actually run after the initial pass
    pub rounds: u32,
    pub elapsed: Duration,
}

/// Hooks invoked by the fetch engine; every method defaults to a no-op
pub trait FetchObserver: Send + Sync {
    fn batch_started(&self, _total: usize) {}

    fn round_started(&self, _round: u32, _pending: usize, _delay: Duration) {}

    fn item_started(&self, _identifier: &str, _position: usize, _total: usize) {}

    fn item_succeeded(&self, _identifier: &str, _attempts: u32) {}

    fn item_failed(&self, _identifier: &str, _attempts: u32, _reason: &FailureReason) {}

    fn batch_finished(&self, _summary: &BatchSummary) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

/// Observer that logs through `tracing` and records metrics
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FetchObserver for TracingObserver {
    fn batch_started(&self, total: usize) {
        info!(total = total, "Attempting to retrieve citation information");
    }

    fn round_started(&self, round: u32, pending: usize, delay: Duration) {
        metrics::record_fetch_round(delay.as_secs_f64());
        info!(
            round = round,
            pending = pending,
            waited_secs = delay.as_secs_f64(),
            "Retrying failed papers"
        );
    }

    fn item_started(&self, identifier: &str, position: usize, total: usize) {
        debug!(identifier = identifier, position = position, total = total, "Requesting citations");
    }

    fn item_succeeded(&self, identifier: &str, attempts: u32) {
        metrics::record_fetch_item(true);
        debug!(identifier = identifier, attempts = attempts, "Citations retrieved");
    }

    fn item_failed(&self, identifier: &str, attempts: u32, reason: &FailureReason) {
        metrics::record_fetch_item(false);
        warn!(
            identifier = identifier,
            attempts = attempts,
            reason = %reason,
            "Citation request failed"
        );
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            rounds = summary.rounds,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Batch finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::StillProcessing { polls: 1 }.to_string(),
            "still processing after 1 poll(s)"
        );
        assert_eq!(FailureReason::Status(500).to_string(), "unexpected status 500");
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let observer = NoopObserver;
        observer.batch_started(3);
        observer.item_failed("x", 1, &FailureReason::Status(404));
        TracingObserver.item_failed("x", 1, &FailureReason::Transport("reset".into()));
    }
}
