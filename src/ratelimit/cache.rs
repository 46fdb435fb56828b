//! Process-local configuration cache.
//!
//! Holds a single validated snapshot. Readers clone the `Arc` under a shared
//! lock; writers swap the whole snapshot under the exclusive lock. A snapshot
//! is never edited in place and the lock is never held across an await.

use std::sync::Arc;

use parking_lot::RwLock;

use super::backend::{AlgorithmRegistry, CountingAlgorithm};
use super::rules::{RateLimitConfig, ValidationError};

/// A validated configuration together with its resolved counting algorithm.
#[derive(Clone)]
pub struct ActiveConfig {
    document: RateLimitConfig,
    algorithm: Arc<dyn CountingAlgorithm>,
}

impl ActiveConfig {
    /// Apply defaults, validate and resolve the algorithm of `document`.
    ///
    /// This is the only way to build an `ActiveConfig`, so the cache can never
    /// hold a document that failed validation.
    pub fn compile(
        mut document: RateLimitConfig,
        registry: &AlgorithmRegistry,
    ) -> Result<Self, ValidationError> {
        document.apply_defaults();
        document.validate()?;
        let algorithm = registry.resolve(&document.algorithm)?;
        Ok(Self {
            document,
            algorithm,
        })
    }

    /// A copy of this snapshot with the master switch set to `enabled`.
    pub fn with_enabled(&self, enabled: bool) -> Self {
        let mut document = self.document.clone();
        document.enabled = enabled;
        Self {
            document,
            algorithm: self.algorithm.clone(),
        }
    }

    pub fn document(&self) -> &RateLimitConfig {
        &self.document
    }

    pub fn algorithm(&self) -> &dyn CountingAlgorithm {
        self.algorithm.as_ref()
    }
}

impl std::fmt::Debug for ActiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConfig")
            .field("document", &self.document)
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

/// Holder of the most recently published [`ActiveConfig`].
#[derive(Debug, Default)]
pub struct ConfigCache {
    current: RwLock<Option<Arc<ActiveConfig>>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if any has been published.
    pub fn get(&self) -> Option<Arc<ActiveConfig>> {
        self.current.read().clone()
    }

    /// Replace the snapshot, returning the previous one.
    pub fn publish(&self, config: Arc<ActiveConfig>) -> Option<Arc<ActiveConfig>> {
        self.current.write().replace(config)
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_none()
    }
}
