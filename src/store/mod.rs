//! Shared key/value store abstraction.
//!
//! Counters and the rate limit configuration document both live in a store
//! shared by every instance of a deployment. The limiter only ever needs four
//! operations from it: `get`, `set`, atomic `incr` and `expire`.

mod memory;
mod redis;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors reported by a [`SharedStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist (or has expired).
    #[error("key not found: {0}")]
    NotFound(String),

    /// Any other backend failure, described by the backend.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Failure reported by the Redis client.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

impl StoreError {
    /// Typed not-found predicate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Capability supplied by the embedder for counter and configuration storage.
///
/// Implementations must make `incr` atomic across every process sharing the
/// store. A missing key is reported by `get` as [`StoreError::NotFound`].
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Unconditionally overwrite `key`. Any TTL previously set is cleared.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Atomically increment the integer under `key` and return the new value.
    /// An absent key is created with value 1.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set a time-to-live on `key`. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;
}

/// Decides whether a store error means "the key is absent".
///
/// Stores that report a missing key through a generic error are recognised by
/// matching configured markers against the error message, case-insensitively.
#[derive(Debug, Clone)]
pub struct NotFoundMatcher {
    markers: Vec<String>,
}

impl NotFoundMatcher {
    /// Create a matcher with custom message markers.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Check whether `error` should be treated as a missing key.
    pub fn matches(&self, error: &StoreError) -> bool {
        if error.is_not_found() {
            return true;
        }
        let message = error.to_string().to_lowercase();
        self.markers.iter().any(|marker| message.contains(marker.as_str()))
    }
}

impl Default for NotFoundMatcher {
    fn default() -> Self {
        Self::new(default_not_found_markers())
    }
}

/// Message markers recognised as "not found" by default.
pub fn default_not_found_markers() -> Vec<String> {
    vec!["not found".to_string(), "nil".to_string()]
}
