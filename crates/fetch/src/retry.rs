//! Bounded multi-round retry with failure-proportional backoff
//!
//! Given the results of an initial pass, re-runs the failing subset for at
//! most `max_rounds` rounds. Before each round it waits for
//! `delay(failing_count)`. Successes are kept as they arrive; failures of a
//! non-final round are carried into the next round only, and the final round
//! contributes every result it produced. Each item therefore appears exactly
//! once in the output.
//!
//! Rounds are strictly sequential: round `k + 1` starts only after every item
//! of round `k` has come back.

use crate::clock::Clock;
use std::future::Future;
use std::time::Duration;

/// Something that either succeeded or should be retried
pub trait Outcome {
    fn succeeded(&self) -> bool;
}

/// What a retry round is about to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundInfo {
    /// 1-based retry round number (the initial pass is round 0)
    pub index: u32,
    /// Items entering this round
    pub pending: usize,
    /// Backoff waited before the round
    pub delay: Duration,
}

/// Retry driver
pub struct BoundedRetry<D> {
    max_rounds: u32,
    delay: D,
}

impl<D> BoundedRetry<D>
where
    D: Fn(usize) -> Duration,
{
    /// `delay` maps the number of still-failing items to the wait before a round
    pub fn new(max_rounds: u32, delay: D) -> Self {
        Self { max_rounds, delay }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Backoff for a round entered with `failing` items
    pub fn delay_for(&self, failing: usize) -> Duration {
        (self.delay)(failing)
    }

    /// Drive retry rounds over the results of the initial pass
    ///
    /// With `max_rounds == 0` the initial pass is itself the final round:
    /// its failures are returned after its successes instead of being
    /// dropped, so callers always get one result per input.
    pub async fn run<T, C, F, Fut>(&self, clock: &C, initial: Vec<T>, mut round: F) -> Vec<T>
    where
        T: Outcome,
        C: Clock + ?Sized,
        F: FnMut(RoundInfo, Vec<T>) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        let (mut settled, mut failing): (Vec<T>, Vec<T>) =
            initial.into_iter().partition(|item| item.succeeded());

        if self.max_rounds == 0 {
            settled.extend(failing);
            return settled;
        }

        for index in 1..=self.max_rounds {
            if failing.is_empty() {
                break;
            }

            let delay = self.delay_for(failing.len());
            clock.sleep(delay).await;

            let info = RoundInfo {
                index,
                pending: failing.len(),
                delay,
            };
            let results = round(info, std::mem::take(&mut failing)).await;

            if index == self.max_rounds {
                settled.extend(results);
            } else {
                let (ok, still_failing): (Vec<T>, Vec<T>) =
                    results.into_iter().partition(|item| item.succeeded());
                settled.extend(ok);
                failing = still_failing;
            }
        }

        settled
    }
}

/// Backoff that charges a fixed delay per still-failing item
pub fn per_item_delay(per_item: Duration) -> impl Fn(usize) -> Duration {
    move |failing| per_item.saturating_mul(u32::try_from(failing).unwrap_or(u32::MAX))
}
