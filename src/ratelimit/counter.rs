//! Sliding window counter over two adjacent fixed buckets.
//!
//! Requests are counted in fixed buckets of `interval` seconds. The count for
//! a request is the current bucket plus the previous bucket weighted by the
//! unspent fraction of the current bucket, rounded up. Rounding up means a
//! single request in the previous bucket always contributes at least one
//! while any of the current bucket remains, which can over-count by up to one
//! previous request early in a bucket.
//!
//! On admission the reported count is `current + weighted_previous + 1`,
//! while the stored current bucket only grows to `current + 1`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::trace;

use super::backend::{CountingAlgorithm, Counters, WindowRequest};
use super::descriptor::CounterKey;
use crate::error::Result;

/// Discriminant of the sliding window algorithm.
pub const SLIDING_WINDOW: &str = "slidingWindow";

/// Where a point in time falls relative to the bucket grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPosition {
    /// Start of the bucket containing `now`
    pub current: i64,
    /// Start of the bucket before it
    pub previous: i64,
    /// Fraction of the current bucket already elapsed, in `[0, 1)`
    pub elapsed: f64,
}

impl WindowPosition {
    /// Locate `now` on a grid of `interval_secs` buckets.
    pub fn at(now: DateTime<Utc>, interval_secs: u64) -> Self {
        let interval = interval_secs.max(1) as i64;
        let secs = now.timestamp();
        let current = secs.div_euclid(interval) * interval;
        let previous = (secs - interval).div_euclid(interval) * interval;

        let into_bucket = (secs - current) as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9;
        let elapsed = (into_bucket / interval as f64).clamp(0.0, 1.0 - f64::EPSILON);

        Self {
            current,
            previous,
            elapsed,
        }
    }
}

/// Contribution of the previous bucket to the current window.
pub fn weighted_previous(previous: u64, elapsed: f64) -> u64 {
    (previous as f64 * (1.0 - elapsed)).ceil() as u64
}

/// The sliding window counting algorithm.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlidingWindow;

#[async_trait]
impl CountingAlgorithm for SlidingWindow {
    fn name(&self) -> &str {
        SLIDING_WINDOW
    }

    async fn count(&self, counters: &Counters<'_>, request: &WindowRequest<'_>) -> Result<u64> {
        let position = WindowPosition::at(request.now, request.interval_secs);
        let previous_key = CounterKey::new(request.group, request.key, position.previous);
        let current_key = CounterKey::new(request.group, request.key, position.current);

        let previous = counters.read(&previous_key).await?;
        let current = counters.read(&current_key).await?;
        let weighted = weighted_previous(previous, position.elapsed);

        trace!(
            key = %current_key,
            previous = previous,
            current = current,
            weighted_previous = weighted,
            elapsed = position.elapsed,
            "Sliding window read"
        );

        if current > request.limit {
            return Ok(current);
        }

        let total = current.saturating_add(weighted);
        if total >= request.limit {
            // Admitting would push the window past the limit. Report at
            // least limit + 1 so the caller denies.
            return Ok(total.max(request.limit.saturating_add(1)));
        }

        let ttl = Duration::from_secs(request.interval_secs.saturating_mul(2));
        counters.increment(&current_key, ttl).await?;

        Ok(total.saturating_add(1))
    }
}
