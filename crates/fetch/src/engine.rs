//! Batch resolution of DOIs against the XML parsing endpoint
//!
//! `resolve_one` never fails: every outcome (processing timeout, bad status,
//! transport error, malformed JSON) is folded into the returned item.
//! `resolve_batch` runs an initial pass over the whole batch and then
//! bounded retry rounds over whatever is still failing, waiting
//! `per_item_delay * failing` before each round.

use crate::clock::{Clock, TokioClock};
use crate::item::FetchItem;
use crate::observer::{BatchSummary, FailureReason, FetchObserver, TracingObserver};
use crate::retry::{per_item_delay, BoundedRetry, Outcome};
use citenet_common::config::FetchConfig;
use citenet_common::errors::Result;
use citenet_common::http::{HttpResponse, NetworkClient};
use citenet_common::metrics::Timer;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Query parameter carrying the DOI URL
const ID_PARAM: &str = "id";

/// An item together with its 1-based position in the submitted batch
struct Slot {
    position: usize,
    item: FetchItem,
}

impl Outcome for Slot {
    fn succeeded(&self) -> bool {
        self.item.is_success()
    }
}

/// Retried, rate-limited batch fetcher
pub struct FetchEngine {
    client: Arc<dyn NetworkClient>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn FetchObserver>,
    config: FetchConfig,
}

impl FetchEngine {
    /// Create an engine; rejects invalid configuration
    pub fn new(client: Arc<dyn NetworkClient>, config: FetchConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            client,
            clock: Arc::new(TokioClock),
            observer: Arc::new(TracingObserver),
            config,
        })
    }

    /// Replace the clock used for backoff and poll waits
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the progress observer
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve a single identifier
    pub async fn resolve_one(&self, identifier: &str) -> FetchItem {
        let slot = Slot {
            position: 1,
            item: FetchItem::pending(identifier),
        };
        self.resolve_slot(slot, 1).await.item
    }

    /// Resolve a batch with bounded retry rounds
    ///
    /// Items that succeed in the initial pass come first, in input order;
    /// later successes are appended round by round, and the final round
    /// contributes its failures too. Every submitted identifier appears
    /// exactly once.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn resolve_batch<S: AsRef<str>>(&self, identifiers: &[S]) -> Vec<FetchItem> {
        let timer = Timer::batch();
        let total = identifiers.len();
        self.observer.batch_started(total);

        let slots: Vec<Slot> = identifiers
            .iter()
            .enumerate()
            .map(|(i, identifier)| Slot {
                position: i + 1,
                item: FetchItem::pending(identifier.as_ref()),
            })
            .collect();

        let first_pass = self.resolve_round(slots, total).await;

        let retry = BoundedRetry::new(
            self.config.retry_rounds,
            per_item_delay(self.config.per_item_delay()),
        );

        let mut rounds = 0u32;
        let rounds_run = &mut rounds;
        let engine = self;
        let slots = retry
            .run(self.clock.as_ref(), first_pass, move |info, pending| {
                *rounds_run += 1;
                engine
                    .observer
                    .round_started(info.index, info.pending, info.delay);
                engine.resolve_round(pending, total)
            })
            .await;

        let items: Vec<FetchItem> = slots.into_iter().map(|slot| slot.item).collect();
        let succeeded = items.iter().filter(|item| item.is_success()).count();

        self.observer.batch_finished(&BatchSummary {
            total,
            succeeded,
            failed: items.len() - succeeded,
            rounds,
            elapsed: Duration::from_secs_f64(timer.finish()),
        });

        items
    }

    /// One pass over `slots`, sequential unless `max_concurrency > 1`
    ///
    /// Results keep the order of `slots` either way.
    async fn resolve_round(&self, slots: Vec<Slot>, total: usize) -> Vec<Slot> {
        if self.config.max_concurrency <= 1 {
            let mut resolved = Vec::with_capacity(slots.len());
            for slot in slots {
                resolved.push(self.resolve_slot(slot, total).await);
            }
            return resolved;
        }

        stream::iter(slots)
            .map(|slot| self.resolve_slot(slot, total))
            .buffered(self.config.max_concurrency)
            .collect()
            .await
    }

    async fn resolve_slot(&self, mut slot: Slot, total: usize) -> Slot {
        self.observer
            .item_started(&slot.item.identifier, slot.position, total);

        match self.attempt(&mut slot.item).await {
            Ok(payload) => {
                slot.item.succeed(payload);
                self.observer
                    .item_succeeded(&slot.item.identifier, slot.item.attempts);
            }
            Err(reason) => {
                slot.item.fail();
                self.observer
                    .item_failed(&slot.item.identifier, slot.item.attempts, &reason);
            }
        }

        slot
    }

    /// One resolution attempt, polling through "still processing" replies
    async fn attempt(&self, item: &mut FetchItem) -> std::result::Result<serde_json::Value, FailureReason> {
        item.attempts += 1;

        let id = format!("{}{}", self.config.doi_prefix, item.identifier);
        let params = [(ID_PARAM, id.as_str())];

        let mut response = self.get(&params).await?;
        let mut processing_replies = 1u32;

        while response.is_processing() {
            if processing_replies > self.config.poll_give_up_count {
                return Err(FailureReason::StillProcessing {
                    polls: processing_replies,
                });
            }
            let poll_delay = self.config.poll_delay();
            if !poll_delay.is_zero() {
                self.clock.sleep(poll_delay).await;
            }
            response = self.get(&params).await?;
            processing_replies += 1;
        }

        if !response.is_ok() {
            return Err(FailureReason::Status(response.status));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| FailureReason::MalformedPayload(e.to_string()))
    }

    async fn get(&self, params: &[(&str, &str)]) -> std::result::Result<HttpResponse, FailureReason> {
        self.client
            .get(&self.config.endpoint, params)
            .await
            .map_err(|e| FailureReason::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::item::FetchStatus;
    use citenet_common::http::{Reply, ScriptedClient};
    use std::sync::Mutex;

    const PAYLOAD: &str = r#"{"uri": "http://example.org/paper/1", "references": []}"#;

    fn key(identifier: &str) -> String {
        format!("http://dx.doi.org/{}", identifier)
    }

    fn config() -> FetchConfig {
        FetchConfig {
            per_item_delay_secs: 0.5,
            ..FetchConfig::default()
        }
    }

    fn engine(client: Arc<ScriptedClient>, config: FetchConfig) -> (FetchEngine, Arc<RecordingClock>) {
        let clock = Arc::new(RecordingClock::new());
        let engine = FetchEngine::new(client, config)
            .unwrap()
            .with_clock(clock.clone());
        (engine, clock)
    }

    fn identifiers(items: &[FetchItem]) -> Vec<&str> {
        items.iter().map(|i| i.identifier.as_str()).collect()
    }

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl EventLog {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl FetchObserver for EventLog {
        fn round_started(&self, round: u32, pending: usize, _delay: Duration) {
            self.push(format!("round {} pending {}", round, pending));
        }

        fn item_started(&self, identifier: &str, position: usize, total: usize) {
            self.push(format!("start {} {}/{}", identifier, position, total));
        }

        fn item_succeeded(&self, identifier: &str, _attempts: u32) {
            self.push(format!("ok {}", identifier));
        }

        fn item_failed(&self, identifier: &str, _attempts: u32, reason: &FailureReason) {
            self.push(format!("fail {} ({})", identifier, reason));
        }
    }

    #[tokio::test]
    async fn test_all_succeed_first_time() {
        let client = Arc::new(ScriptedClient::new("id").with_fallback(Reply::ok(PAYLOAD)));
        let (engine, clock) = engine(client.clone(), config());

        let items = engine.resolve_batch(&["a", "b", "c"]).await;

        assert_eq!(identifiers(&items), vec!["a", "b", "c"]);
        assert!(items.iter().all(|i| i.is_success() && i.attempts == 1));
        assert!(items.iter().all(|i| i.payload.is_some()));
        assert!(clock.waits().is_empty());
        assert_eq!(client.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_always_failing_is_capped() {
        let client = Arc::new(ScriptedClient::new("id").script(key("bad"), vec![Reply::status(500)]));
        let (engine, clock) = engine(client.clone(), config());

        let items = engine.resolve_batch(&["bad"]).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, FetchStatus::Failed);
        assert_eq!(items[0].attempts, 3);
        assert!(items[0].payload.is_none());
        assert_eq!(client.calls_for(&key("bad")), 3);
        assert_eq!(
            clock.waits(),
            vec![Duration::from_millis(500), Duration::from_millis(500)]
        );
    }

    #[tokio::test]
    async fn test_retry_success_appears_once() {
        let client = Arc::new(
            ScriptedClient::new("id")
                .script(key("A"), vec![Reply::status(503), Reply::ok(PAYLOAD)])
                .script(key("B"), vec![Reply::ok(PAYLOAD)]),
        );
        let (engine, clock) = engine(client.clone(), config());

        let items = engine.resolve_batch(&["A", "B"]).await;

        assert_eq!(identifiers(&items), vec!["B", "A"]);
        assert!(items.iter().all(|i| i.is_success()));
        assert_eq!(items[1].attempts, 2);
        assert_eq!(client.calls_for(&key("A")), 2);
        assert_eq!(client.calls_for(&key("B")), 1);
        assert_eq!(clock.waits(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn test_backoff_tracks_remaining_failures() {
        let client = Arc::new(
            ScriptedClient::new("id")
                .script(key("x"), vec![Reply::status(500), Reply::ok(PAYLOAD)])
                .script(key("y"), vec![Reply::status(500)])
                .script(key("z"), vec![Reply::status(500)]),
        );
        let (engine, clock) = engine(client, config());

        let items = engine.resolve_batch(&["x", "y", "z"]).await;

        assert_eq!(
            clock.waits(),
            vec![Duration::from_millis(1500), Duration::from_millis(1000)]
        );
        assert_eq!(identifiers(&items), vec!["x", "y", "z"]);
        assert!(items[0].is_success());
        assert!(items[1].is_failed() && items[2].is_failed());
    }

    #[tokio::test]
    async fn test_processing_gives_up_by_default() {
        let client = Arc::new(
            ScriptedClient::new("id").script(key("slow"), vec![Reply::processing(), Reply::ok(PAYLOAD)]),
        );
        let (engine, _clock) = engine(client.clone(), config());

        let item = engine.resolve_one("slow").await;

        assert!(item.is_failed());
        assert!(item.payload.is_none());
        assert_eq!(client.calls_for(&key("slow")), 1);
    }

    #[tokio::test]
    async fn test_processing_polls_within_budget() {
        let client = Arc::new(ScriptedClient::new("id").script(
            key("slow"),
            vec![Reply::processing(), Reply::processing(), Reply::ok(PAYLOAD)],
        ));
        let cfg = FetchConfig {
            poll_give_up_count: 2,
            poll_delay_secs: 0.25,
            ..config()
        };
        let (engine, clock) = engine(client.clone(), cfg);

        let item = engine.resolve_one("slow").await;

        assert!(item.is_success());
        assert_eq!(item.attempts, 1);
        assert_eq!(client.calls_for(&key("slow")), 3);
        assert_eq!(clock.waits(), vec![Duration::from_millis(250); 2]);
    }

    #[tokio::test]
    async fn test_processing_budget_exhausted() {
        let client = Arc::new(ScriptedClient::new("id").script(key("slow"), vec![Reply::processing()]));
        let cfg = FetchConfig {
            poll_give_up_count: 2,
            ..config()
        };
        let (engine, _clock) = engine(client.clone(), cfg);

        let item = engine.resolve_one("slow").await;

        assert!(item.is_failed());
        assert_eq!(client.calls_for(&key("slow")), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_fails() {
        let client = Arc::new(ScriptedClient::new("id").script(key("m"), vec![Reply::ok("<html>oops")]));
        let (engine, _clock) = engine(client, config());

        let item = engine.resolve_one("m").await;

        assert!(item.is_failed());
        assert!(item.payload.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_fails() {
        let client = Arc::new(ScriptedClient::new("id").script(key("t"), vec![Reply::transport("reset")]));
        let (engine, _clock) = engine(client, config());

        let item = engine.resolve_one("t").await;

        assert!(item.is_failed());
        assert_eq!(item.attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_retry_rounds_keeps_failures() {
        let client = Arc::new(
            ScriptedClient::new("id")
                .script(key("bad"), vec![Reply::status(404)])
                .script(key("good"), vec![Reply::ok(PAYLOAD)]),
        );
        let cfg = FetchConfig {
            retry_rounds: 0,
            ..config()
        };
        let (engine, clock) = engine(client, cfg);

        let items = engine.resolve_batch(&["bad", "good"]).await;

        assert_eq!(identifiers(&items), vec!["good", "bad"]);
        assert_eq!(items[1].attempts, 1);
        assert!(clock.waits().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_are_independent() {
        let client = Arc::new(ScriptedClient::new("id").with_fallback(Reply::ok(PAYLOAD)));
        let log = Arc::new(EventLog::default());
        let (engine, _clock) = engine(client, config());
        let engine = engine.with_observer(log.clone());

        let items = engine.resolve_batch(&["dup", "dup"]).await;

        assert_eq!(items.len(), 2);
        let events = log.events();
        assert!(events.contains(&"start dup 1/2".to_string()));
        assert!(events.contains(&"start dup 2/2".to_string()));
    }

    #[tokio::test]
    async fn test_observer_sees_rounds_and_positions() {
        let client = Arc::new(
            ScriptedClient::new("id")
                .script(key("A"), vec![Reply::status(500), Reply::ok(PAYLOAD)])
                .script(key("B"), vec![Reply::ok(PAYLOAD)]),
        );
        let log = Arc::new(EventLog::default());
        let (engine, _clock) = engine(client, config());
        let engine = engine.with_observer(log.clone());

        engine.resolve_batch(&["A", "B"]).await;

        assert_eq!(
            log.events(),
            vec![
                "start A 1/2".to_string(),
                "fail A (unexpected status 500)".to_string(),
                "start B 2/2".to_string(),
                "ok B".to_string(),
                "round 1 pending 1".to_string(),
                "start A 1/2".to_string(),
                "ok A".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_round_matches_sequential() {
        let script = || {
            ScriptedClient::new("id")
                .script(key("a"), vec![Reply::status(500), Reply::ok(PAYLOAD)])
                .script(key("b"), vec![Reply::ok(PAYLOAD)])
                .script(key("c"), vec![Reply::status(500)])
                .script(key("d"), vec![Reply::ok(PAYLOAD)])
        };
        let ids = ["a", "b", "c", "d"];

        let (sequential, _) = engine(Arc::new(script()), config());
        let (concurrent, clock) = engine(
            Arc::new(script()),
            FetchConfig {
                max_concurrency: 4,
                ..config()
            },
        );

        let left = sequential.resolve_batch(&ids).await;
        let right = concurrent.resolve_batch(&ids).await;

        assert_eq!(identifiers(&left), identifiers(&right));
        assert_eq!(identifiers(&right), vec!["b", "d", "a", "c"]);
        let statuses = |items: &[FetchItem]| items.iter().map(|i| i.status).collect::<Vec<_>>();
        assert_eq!(statuses(&left), statuses(&right));
        assert_eq!(
            clock.waits(),
            vec![Duration::from_millis(1000), Duration::from_millis(500)]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let client = Arc::new(ScriptedClient::new("id"));
        let cfg = FetchConfig {
            per_item_delay_secs: f64::INFINITY,
            ..FetchConfig::default()
        };
        assert!(FetchEngine::new(client, cfg).is_err());
    }

    #[test]
    fn test_delay_too_large_for_duration_rejected_up_front() {
        let client = Arc::new(ScriptedClient::new("id").with_fallback(Reply::status(500)));
        let cfg = FetchConfig {
            per_item_delay_secs: 1e30,
            ..FetchConfig::default()
        };
        let err = FetchEngine::new(client, cfg).err().unwrap();
        assert_eq!(err.code(), citenet_common::errors::ErrorCode::ValidationError);
    }

    #[test]
    fn test_blocking_resolve() {
        let client = Arc::new(ScriptedClient::new("id").with_fallback(Reply::ok(PAYLOAD)));
        let (engine, _clock) = engine(client, config());

        let item = tokio_test::block_on(engine.resolve_one("10.1371/journal.pone.0000001"));
        let record = item.record().unwrap().unwrap();
        assert_eq!(record.uri, "http://example.org/paper/1");
    }
}
