//! citenet batch fetcher
//!
//! Resolves batches of DOIs against the XML parsing endpoint with:
//! - "still processing" polling under a per-call budget
//! - bounded retry rounds with backoff proportional to the failure count
//! - pluggable clock and progress observer

pub mod clock;
pub mod engine;
pub mod item;
pub mod observer;
pub mod retry;

pub use clock::{Clock, RecordingClock, TokioClock};
pub use engine::FetchEngine;
pub use item::{FetchItem, FetchStatus};
pub use observer::{BatchSummary, FailureReason, FetchObserver, NoopObserver, TracingObserver};
pub use retry::{BoundedRetry, Outcome, RoundInfo};
