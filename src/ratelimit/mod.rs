//! Rate limiting logic and state management.

mod backend;
mod cache;
mod clock;
mod counter;
mod descriptor;
mod limiter;
mod refresher;
mod rules;

pub use backend::{AlgorithmRegistry, CountingAlgorithm, Counters, WindowRequest};
pub use cache::{ActiveConfig, ConfigCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use counter::{weighted_previous, SlidingWindow, WindowPosition, SLIDING_WINDOW};
pub use descriptor::CounterKey;
pub use limiter::{
    Decision, LimiterSlot, RateLimiter, RateLimiterBuilder, DEFAULT_CONFIG_KEY,
    DEFAULT_UNHEALTHY_AFTER,
};
pub use refresher::{ConfigRefresher, HealthTracker, RefreshHealth};
pub use rules::{
    GroupConfig, RateLimitConfig, ValidationError, DEFAULT_CACHE_TTL_SECS, MAX_INTERVAL_SECS,
    MIN_CACHE_TTL_SECS, MIN_INTERVAL_SECS,
};
