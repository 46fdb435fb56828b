//! Counting algorithm trait, counter access and the algorithm registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::descriptor::CounterKey;
use super::rules::ValidationError;
use crate::error::{LimitError, Result};
use crate::store::{NotFoundMatcher, SharedStore};

/// Inputs of a single counting call.
#[derive(Debug, Clone, Copy)]
pub struct WindowRequest<'a> {
    /// Current wall-clock time
    pub now: DateTime<Utc>,
    /// Request group
    pub group: &'a str,
    /// Endpoint key within the group
    pub key: &'a str,
    /// Bucket length in seconds
    pub interval_secs: u64,
    /// Effective limit for the group and key
    pub limit: u64,
}

/// Trait for counting algorithm implementations.
///
/// An algorithm returns the request count it attributes to the current
/// window. The caller admits the request when that count is at most the
/// limit. Algorithms only touch counters through [`Counters`].
#[async_trait]
pub trait CountingAlgorithm: Send + Sync {
    /// Discriminant under which the algorithm is registered.
    fn name(&self) -> &str;

    /// Count the request described by `request`.
    async fn count(&self, counters: &Counters<'_>, request: &WindowRequest<'_>) -> Result<u64>;
}

/// Counter reads and writes against the shared store.
pub struct Counters<'a> {
    store: &'a dyn SharedStore,
    not_found: &'a NotFoundMatcher,
}

impl<'a> Counters<'a> {
    pub fn new(store: &'a dyn SharedStore, not_found: &'a NotFoundMatcher) -> Self {
        Self { store, not_found }
    }

    /// Read a counter. A missing counter reads as zero.
    pub async fn read(&self, key: &CounterKey) -> Result<u64> {
        let storage_key = key.storage_key();
        let raw = match self.store.get(&storage_key).await {
            Ok(raw) => raw,
            Err(e) if self.not_found.matches(&e) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| LimitError::InvalidCounter {
                key: storage_key,
                value: String::from_utf8_lossy(&raw).into_owned(),
            })
    }

    /// Increment a counter and attach `ttl` to it.
    ///
    /// Fails when the expire call fails or is not applied; the increment is
    /// not rolled back.
    pub async fn increment(&self, key: &CounterKey, ttl: Duration) -> Result<i64> {
        let storage_key = key.storage_key();
        let value = self.store.incr(&storage_key).await?;
        if !self.store.expire(&storage_key, ttl).await? {
            return Err(LimitError::ExpireNotApplied { key: storage_key });
        }
        Ok(value)
    }
}

/// Registry of counting algorithms keyed by their discriminant.
#[derive(Clone)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<String, Arc<dyn CountingAlgorithm>>,
}

impl AlgorithmRegistry {
    /// A registry with no algorithms.
    pub fn empty() -> Self {
        Self {
            algorithms: HashMap::new(),
        }
    }

    /// Register an algorithm under its own name, replacing any previous one.
    pub fn register(&mut self, algorithm: Arc<dyn CountingAlgorithm>) -> &mut Self {
        self.algorithms.insert(algorithm.name().to_string(), algorithm);
        self
    }

    /// Look up the algorithm for a discriminant.
    pub fn resolve(&self, name: &str) -> std::result::Result<Arc<dyn CountingAlgorithm>, ValidationError> {
        self.algorithms
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownAlgorithm(name.to_string()))
    }

    /// Registered discriminants, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(super::counter::SlidingWindow));
        registry
    }
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &self.names())
            .finish()
    }
}
