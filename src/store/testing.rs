//! Failure-injecting store wrapper for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MemoryStore, SharedStore, StoreError};

/// Wraps a [`MemoryStore`] and fails selected operations on demand.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    fail_get_prefix: Mutex<Option<String>>,
    fail_set: AtomicBool,
    fail_incr: AtomicBool,
    fail_expire: AtomicBool,
    refuse_expire: AtomicBool,
    untyped_not_found: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
    incrs: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail every `get` whose key starts with `prefix` (`None` to stop).
    pub(crate) fn fail_get(&self, prefix: Option<&str>) {
        *self.fail_get_prefix.lock() = prefix.map(str::to_string);
    }

    pub(crate) fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_incr(&self, fail: bool) {
        self.fail_incr.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_expire(&self, fail: bool) {
        self.fail_expire.store(fail, Ordering::SeqCst);
    }

    /// Make `expire` report "not applied" without failing.
    pub(crate) fn refuse_expire(&self, refuse: bool) {
        self.refuse_expire.store(refuse, Ordering::SeqCst);
    }

    /// Report missing keys as a generic backend error instead of `NotFound`.
    pub(crate) fn untyped_not_found(&self, enabled: bool) {
        self.untyped_not_found.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub(crate) fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub(crate) fn incr_calls(&self) -> usize {
        self.incrs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SharedStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_get_prefix
            .lock()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if failing {
            return Err(StoreError::Backend("connection reset by peer".to_string()));
        }
        match self.inner.get(key).await {
            Err(StoreError::NotFound(_)) if self.untyped_not_found.load(Ordering::SeqCst) => {
                Err(StoreError::Backend("redis: nil".to_string()))
            }
            other => other,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write timed out".to_string()));
        }
        self.inner.set(key, value).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.incrs.fetch_add(1, Ordering::SeqCst);
        if self.fail_incr.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write timed out".to_string()));
        }
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        if self.fail_expire.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write timed out".to_string()));
        }
        if self.refuse_expire.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.expire(key, ttl).await
    }
}
