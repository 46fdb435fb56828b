//! Background refresh of the configuration cache.
//!
//! The refresher re-reads the configuration document from the shared store
//! every `inMemoryCacheTTL` seconds and publishes it. A failed refresh is
//! logged and leaves the previous snapshot in place; consecutive failures are
//! tracked so the admin surface can report a stale cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;
use super::rules::DEFAULT_CACHE_TTL_SECS;
use crate::error::LimitError;

/// Point-in-time view of the refresher's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub period_secs: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct HealthState {
    consecutive_failures: u32,
    period_secs: u64,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Records refresh outcomes.
#[derive(Debug, Default)]
pub struct HealthTracker {
    state: Mutex<HealthState>,
}

impl HealthTracker {
    pub fn record_success(&self, at: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.last_success = Some(at);
    }

    pub fn record_failure(&self, at: DateTime<Utc>, error: &LimitError) {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(at);
        state.last_error = Some(error.to_string());
    }

    pub fn set_period(&self, period: Duration) {
        self.state.lock().period_secs = period.as_secs();
    }

    /// Unhealthy once `unhealthy_after` refreshes in a row have failed.
    pub fn snapshot(&self, unhealthy_after: u32) -> RefreshHealth {
        let state = self.state.lock();
        RefreshHealth {
            healthy: state.consecutive_failures < unhealthy_after,
            consecutive_failures: state.consecutive_failures,
            period_secs: state.period_secs,
            last_success: state.last_success,
            last_failure: state.last_failure,
            last_error: state.last_error.clone(),
        }
    }
}

/// Periodically reloads the configuration of a [`RateLimiter`].
pub struct ConfigRefresher {
    limiter: Arc<RateLimiter>,
    period: Duration,
}

impl ConfigRefresher {
    /// Create a refresher whose period comes from the cached document, or
    /// the default period when nothing is cached yet.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        let period = limiter
            .cached_config()
            .map(|config| config.document().refresh_period())
            .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
        Self { limiter, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run the refresher on its own task until `shutdown` resolves.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }

    /// Refresh every period until `shutdown` resolves.
    ///
    /// The first refresh happens one period after start. When a refreshed
    /// document declares a different period the ticker is rebuilt.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = Self::ticker(self.period);
        self.limiter.health().set_period(self.period);

        info!(period_secs = self.period.as_secs(), "Configuration refresher started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Configuration refresher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(period) = self.refresh_once().await else {
                        continue;
                    };
                    if period != self.period {
                        info!(
                            old_period_secs = self.period.as_secs(),
                            new_period_secs = period.as_secs(),
                            "Refresh period changed"
                        );
                        self.period = period;
                        self.limiter.health().set_period(period);
                        ticker = Self::ticker(period);
                    }
                }
            }
        }
    }

    /// Reload once. Returns the refresh period of the new snapshot, or
    /// `None` if the reload failed.
    pub async fn refresh_once(&self) -> Option<Duration> {
        let now = self.limiter.clock().now();
        match self.limiter.reload().await {
            Ok(config) => {
                self.limiter.health().record_success(now);
                debug!(
                    enabled = config.document().enabled,
                    groups = config.document().groups.len(),
                    "Configuration refreshed"
                );
                Some(config.document().refresh_period())
            }
            Err(e) => {
                self.limiter.health().record_failure(now, &e);
                warn!(error = %e, "Configuration refresh failed, keeping previous snapshot");
                None
            }
        }
    }

    fn ticker(period: Duration) -> Interval {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

impl std::fmt::Debug for ConfigRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRefresher")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}
