//! Snapshot stabilization wait.
//!
//! Waits for the first timestamped value of a one-shot snapshot request.
//! Each wait is bounded by the interval and by the overall deadline, so the
//! loop always ends within `overall + interval`.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::TickerUpdates;
use crate::domain::market_data::StabilizationResult;
use crate::infrastructure::metrics::{self, SnapshotOutcome};

/// Timing of the stabilization wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizationPolicy {
    /// Wait per update event.
    pub interval: Duration,
    /// Overall deadline.
    pub overall: Duration,
}

impl StabilizationPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(interval: Duration, overall: Duration) -> Self {
        Self { interval, overall }
    }

    /// Consecutive empty waits tolerated before giving up.
    #[must_use]
    pub fn max_consecutive_timeouts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let max = self.overall.as_millis() / interval;
        u32::try_from(max).unwrap_or(u32::MAX).max(1)
    }
}

/// Wait until the ticker reports a timestamped value or the policy gives up.
///
/// Updates without a value reset the consecutive-timeout counter.
pub async fn stabilize<U: TickerUpdates + ?Sized>(
    updates: &mut U,
    policy: StabilizationPolicy,
) -> StabilizationResult {
    let deadline = Instant::now() + policy.overall;
    let max_timeouts = policy.max_consecutive_timeouts();
    let mut consecutive_timeouts = 0u32;

    let outcome = loop {
        let now = Instant::now();
        if now >= deadline {
            break SnapshotOutcome::Deadline;
        }
        let wait = policy.interval.min(deadline - now);

        match tokio::time::timeout(wait, updates.next_update()).await {
            Ok(Some(ticker)) if ticker.has_value() => {
                metrics::record_snapshot(SnapshotOutcome::Value);
                return StabilizationResult::value(ticker);
            }
            Ok(Some(_)) => {
                consecutive_timeouts = 0;
            }
            Ok(None) => break SnapshotOutcome::StreamClosed,
            Err(_) => {
                consecutive_timeouts += 1;
                tracing::trace!(consecutive_timeouts, "No snapshot update");
                if consecutive_timeouts >= max_timeouts {
                    break SnapshotOutcome::ConsecutiveTimeouts;
                }
            }
        }
    };

    tracing::debug!(?outcome, "Snapshot wait ended without a value");
    metrics::record_snapshot(outcome);
    StabilizationResult::timed_out()
}
