//! Core rate limiter: configuration lifecycle and admission decisions.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, trace, warn};

use super::backend::{AlgorithmRegistry, Counters, WindowRequest};
use super::cache::{ActiveConfig, ConfigCache};
use super::clock::{Clock, SystemClock};
use super::refresher::{HealthTracker, RefreshHealth};
use super::rules::RateLimitConfig;
use crate::error::{LimitError, Result};
use crate::http::middleware::RateLimitLayer;
use crate::http::responder::Responder;
use crate::store::{NotFoundMatcher, SharedStore};

/// Default key of the configuration document in the shared store.
pub const DEFAULT_CONFIG_KEY: &str = "ratelimit_config";
/// Consecutive refresh failures after which the refresher reports unhealthy.
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Limiting is disabled or the group is not configured
    PassThrough,
    /// The request is within its limit
    Admitted { limit: u64, count: u64, remaining: u64 },
    /// The request exceeded its limit
    Denied { limit: u64, count: u64 },
}

/// The rate limiter shared by the middleware, the admin surface and the
/// configuration refresher.
///
/// This struct is thread-safe and is meant to live in an `Arc` for the
/// lifetime of the process.
pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
    cache: ConfigCache,
    registry: AlgorithmRegistry,
    clock: Arc<dyn Clock>,
    responder: Arc<dyn Responder>,
    not_found: NotFoundMatcher,
    config_key: String,
    health: HealthTracker,
    unhealthy_after: u32,
}

impl RateLimiter {
    /// Start building a rate limiter over `store`.
    pub fn builder(store: Arc<dyn SharedStore>) -> RateLimiterBuilder {
        RateLimiterBuilder::new(store)
    }

    /// Middleware factory: a layer enforcing the limit of `group` and `key`
    /// on the service it wraps.
    pub fn check(self: &Arc<Self>, group: impl Into<String>, key: impl Into<String>) -> RateLimitLayer {
        RateLimitLayer::new(self.clone(), group, key)
    }

    /// The current configuration.
    ///
    /// Served from the process-local cache; on a cold cache the document is
    /// read from the shared store, validated and published.
    pub async fn current_config(&self) -> Result<Arc<ActiveConfig>> {
        if let Some(config) = self.cache.get() {
            return Ok(config);
        }

        let config = self
            .fetch_config()
            .await
            .map_err(|e| LimitError::ConfigLoad(Box::new(e)))?;
        self.cache.publish(config.clone());
        debug!(config_key = %self.config_key, "Configuration loaded into cache");
        Ok(config)
    }

    /// Read the document from the shared store and publish it unconditionally.
    ///
    /// The cache is left untouched when the read, decode or validation fails.
    pub async fn reload(&self) -> Result<Arc<ActiveConfig>> {
        let config = self.fetch_config().await?;
        self.cache.publish(config.clone());
        Ok(config)
    }

    /// Validate, persist and publish a new configuration document.
    ///
    /// Returns the stored document with defaults applied. Nothing is written
    /// when validation fails, and the cache is not touched when the store
    /// write fails.
    pub async fn replace_config(&self, document: RateLimitConfig) -> Result<RateLimitConfig> {
        let config = Arc::new(ActiveConfig::compile(document, &self.registry)?);
        self.persist(&config).await?;
        self.cache.publish(config.clone());

        info!(
            enabled = config.document().enabled,
            interval_secs = config.document().interval_secs,
            groups = config.document().groups.len(),
            "Rate limit configuration replaced"
        );
        Ok(config.document().clone())
    }

    /// Flip the master switch.
    ///
    /// This is a read-modify-write of the stored document without any
    /// coordination between instances; concurrent toggles resolve as
    /// last-writer-wins.
    pub async fn set_enabled(&self, enabled: bool) -> Result<bool> {
        let current = self.current_config().await?;
        let config = Arc::new(current.with_enabled(enabled));
        self.persist(&config).await?;
        self.cache.publish(config);

        info!(enabled = enabled, "Rate limiting toggled");
        Ok(enabled)
    }

    /// Decide whether a request of `group` / `key` is admitted.
    pub async fn evaluate(&self, group: &str, key: &str) -> Result<Decision> {
        let config = self.current_config().await?;
        let document = config.document();

        if !document.enabled {
            trace!(group = %group, key = %key, "Rate limiting disabled");
            return Ok(Decision::PassThrough);
        }

        let Some(limit) = document.effective_limit(group, key) else {
            trace!(group = %group, key = %key, "Group not configured");
            return Ok(Decision::PassThrough);
        };

        let counters = Counters::new(self.store.as_ref(), &self.not_found);
        let request = WindowRequest {
            now: self.clock.now(),
            group,
            key,
            interval_secs: document.interval_secs,
            limit,
        };
        let count = config.algorithm().count(&counters, &request).await?;

        if count > limit {
            debug!(
                group = %group,
                key = %key,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
            return Ok(Decision::Denied { limit, count });
        }

        Ok(Decision::Admitted {
            limit,
            count,
            remaining: limit.saturating_sub(count),
        })
    }

    /// The embedder-supplied responder.
    pub fn responder(&self) -> &dyn Responder {
        self.responder.as_ref()
    }

    /// The cached configuration, without touching the shared store.
    pub fn cached_config(&self) -> Option<Arc<ActiveConfig>> {
        self.cache.get()
    }

    /// Health of the background configuration refresher.
    pub fn refresh_health(&self) -> RefreshHealth {
        self.health.snapshot(self.unhealthy_after)
    }

    pub(crate) fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Key of the configuration document in the shared store.
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    async fn fetch_config(&self) -> Result<Arc<ActiveConfig>> {
        let raw = match self.store.get(&self.config_key).await {
            Ok(raw) => raw,
            Err(e) if self.not_found.matches(&e) => {
                return Err(LimitError::ConfigMissing {
                    key: self.config_key.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let document = RateLimitConfig::from_json_slice(&raw)?;
        let config = ActiveConfig::compile(document, &self.registry)?;
        Ok(Arc::new(config))
    }

    async fn persist(&self, config: &ActiveConfig) -> Result<()> {
        let bytes = config.document().to_json_vec()?;
        self.store.set(&self.config_key, bytes).await?;
        Ok(())
    }

    async fn seed(&self, document: RateLimitConfig) -> Result<()> {
        let config = Arc::new(ActiveConfig::compile(document, &self.registry)?);

        match self.store.get(&self.config_key).await {
            Ok(_) => {
                info!(config_key = %self.config_key, "Configuration already stored, seed ignored");
                Ok(())
            }
            Err(e) if self.not_found.matches(&e) => {
                self.persist(&config).await?;
                self.cache.publish(config);
                info!(config_key = %self.config_key, "Seeded rate limit configuration");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to check for an existing configuration");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config_key", &self.config_key)
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RateLimiter`].
pub struct RateLimiterBuilder {
    store: Arc<dyn SharedStore>,
    responder: Option<Arc<dyn Responder>>,
    registry: AlgorithmRegistry,
    clock: Arc<dyn Clock>,
    config_key: String,
    not_found: NotFoundMatcher,
    unhealthy_after: u32,
    seed: Option<RateLimitConfig>,
}

impl RateLimiterBuilder {
    fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            responder: None,
            registry: AlgorithmRegistry::default(),
            clock: Arc::new(SystemClock),
            config_key: DEFAULT_CONFIG_KEY.to_string(),
            not_found: NotFoundMatcher::default(),
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
            seed: None,
        }
    }

    /// Responder used for rejections and internal errors. Required.
    pub fn responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn registry(mut self, registry: AlgorithmRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config_key(mut self, key: impl Into<String>) -> Self {
        self.config_key = key.into();
        self
    }

    pub fn not_found(mut self, matcher: NotFoundMatcher) -> Self {
        self.not_found = matcher;
        self
    }

    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.unhealthy_after = failures.max(1);
        self
    }

    /// Document written to the store at build time if none is stored yet.
    pub fn seed(mut self, document: RateLimitConfig) -> Self {
        self.seed = Some(document);
        self
    }

    /// Build the limiter, seeding the configuration document if requested.
    pub async fn build(self) -> Result<Arc<RateLimiter>> {
        let responder = self.responder.ok_or(LimitError::MissingResponder)?;

        let limiter = Arc::new(RateLimiter {
            store: self.store,
            cache: ConfigCache::new(),
            registry: self.registry,
            clock: self.clock,
            responder,
            not_found: self.not_found,
            config_key: self.config_key,
            health: HealthTracker::default(),
            unhealthy_after: self.unhealthy_after,
        });

        if let Some(document) = self.seed {
            limiter.seed(document).await?;
        }

        info!(
            config_key = %limiter.config_key,
            algorithms = ?limiter.registry.names(),
            "Rate limiter initialized"
        );
        Ok(limiter)
    }
}

/// Process-scoped home of the rate limiter.
///
/// Admin handlers are wired against the slot before the limiter exists and
/// answer "not initialised" until one is installed.
#[derive(Clone, Default)]
pub struct LimiterSlot {
    inner: Arc<OnceLock<Arc<RateLimiter>>>,
}

impl LimiterSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the limiter. Fails, handing it back, if one is already installed.
    pub fn install(&self, limiter: Arc<RateLimiter>) -> std::result::Result<(), Arc<RateLimiter>> {
        self.inner.set(limiter)
    }

    /// The installed limiter.
    pub fn get(&self) -> Result<Arc<RateLimiter>> {
        self.inner.get().cloned().ok_or(LimitError::NotInitialized)
    }
}

impl std::fmt::Debug for LimiterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterSlot")
            .field("installed", &self.inner.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::responder::EnvelopeResponder;
    use crate::ratelimit::clock::FixedClock;
    use crate::ratelimit::descriptor::CounterKey;
    use crate::ratelimit::rules::GroupConfig;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use tokio_test::assert_ok;

    const BASE: i64 = 1_704_067_200;

    fn document(limit: u64) -> RateLimitConfig {
        RateLimitConfig::new(60).with_group("external", GroupConfig::new(limit))
    }

    fn clock_at(secs: i64, millis: u32) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.timestamp_opt(secs, millis * 1_000_000).unwrap(),
        ))
    }

    async fn limiter_over(
        store: Arc<dyn SharedStore>,
        clock: Arc<FixedClock>,
        seed: Option<RateLimitConfig>,
    ) -> Arc<RateLimiter> {
        let mut builder = RateLimiter::builder(store)
            .responder(Arc::new(EnvelopeResponder))
            .clock(clock);
        if let Some(document) = seed {
            builder = builder.seed(document);
        }
        builder.build().await.unwrap()
    }

    async fn set_counter(store: &dyn SharedStore, bucket: i64, value: u64) {
        let key = CounterKey::new("external", "orders", bucket).storage_key();
        store.set(&key, value.to_string().into_bytes()).await.unwrap();
    }

    async fn counter(store: &dyn SharedStore, bucket: i64) -> u64 {
        let key = CounterKey::new("external", "orders", bucket).storage_key();
        match store.get(&key).await {
            Ok(raw) => String::from_utf8(raw).unwrap().parse().unwrap(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_build_requires_responder() {
        let result = RateLimiter::builder(Arc::new(MemoryStore::new())).build().await;
        assert!(matches!(result, Err(LimitError::MissingResponder)));
    }

    #[tokio::test]
    async fn test_seed_writes_when_absent() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;

        let stored = RateLimitConfig::from_json_slice(&store.get(DEFAULT_CONFIG_KEY).await.unwrap()).unwrap();
        assert_eq!(stored, document(5));
        assert!(limiter.cached_config().is_some());
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_document() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(DEFAULT_CONFIG_KEY, document(7).to_json_vec().unwrap())
            .await
            .unwrap();

        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;
        assert!(limiter.cached_config().is_none());

        let config = limiter.current_config().await.unwrap();
        assert_eq!(config.document().groups["external"].limit, 7);
    }

    #[tokio::test]
    async fn test_invalid_seed_fails_build() {
        let store = Arc::new(MemoryStore::new());
        let result = RateLimiter::builder(store.clone())
            .responder(Arc::new(EnvelopeResponder))
            .seed(RateLimitConfig::new(10))
            .build()
            .await;
        assert!(matches!(result, Err(LimitError::Validation(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_lazy_load_then_cached() {
        let store = Arc::new(FlakyStore::new());
        store
            .inner
            .set(DEFAULT_CONFIG_KEY, document(5).to_json_vec().unwrap())
            .await
            .unwrap();
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), None).await;

        assert_ok!(limiter.current_config().await);
        assert_eq!(store.get_calls(), 1);

        assert_ok!(limiter.current_config().await);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_load_error() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store, clock_at(BASE, 0), None).await;

        let err = limiter.evaluate("external", "orders").await.unwrap_err();
        assert!(matches!(err, LimitError::ConfigLoad(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_stored_document_never_cached() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(DEFAULT_CONFIG_KEY, br#"{"enabled":true,"intervalInSec":5,"algorithm":"slidingWindow"}"#.to_vec())
            .await
            .unwrap();
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), None).await;

        assert!(limiter.current_config().await.is_err());
        assert!(limiter.cached_config().is_none());

        store.set(DEFAULT_CONFIG_KEY, b"not json".to_vec()).await.unwrap();
        assert!(limiter.current_config().await.is_err());
        assert!(limiter.cached_config().is_none());
    }

    #[tokio::test]
    async fn test_steady_admission() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE + 30, 0), Some(document(10))).await;
        set_counter(store.as_ref(), BASE - 60, 4).await;
        set_counter(store.as_ref(), BASE, 3).await;

        let decision = limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(
            decision,
            Decision::Admitted {
                limit: 10,
                count: 6,
                remaining: 4
            }
        );
        assert_eq!(counter(store.as_ref(), BASE).await, 4);
    }

    #[tokio::test]
    async fn test_boundary_admission_at_limit() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE + 30, 0), Some(document(5))).await;
        set_counter(store.as_ref(), BASE - 60, 2).await;
        set_counter(store.as_ref(), BASE, 3).await;

        let decision = limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(
            decision,
            Decision::Admitted {
                limit: 5,
                count: 5,
                remaining: 0
            }
        );
    }

    #[tokio::test]
    async fn test_denial_by_weighted_sum() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE + 59, 400), Some(document(5))).await;
        set_counter(store.as_ref(), BASE - 60, 1).await;
        set_counter(store.as_ref(), BASE, 5).await;

        let decision = limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(decision, Decision::Denied { limit: 5, count: 6 });
        assert_eq!(counter(store.as_ref(), BASE).await, 5);
    }

    #[tokio::test]
    async fn test_reduced_limit_short_circuits() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE + 10, 0), Some(document(5))).await;
        set_counter(store.as_ref(), BASE, 7).await;

        let decision = limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(decision, Decision::Denied { limit: 5, count: 7 });
        assert_eq!(counter(store.as_ref(), BASE).await, 7);
    }

    #[tokio::test]
    async fn test_override_limit_applies() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let doc = RateLimitConfig::new(60)
            .with_group("external", GroupConfig::new(100).with_override("orders", 1));
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(doc)).await;

        assert!(matches!(
            limiter.evaluate("external", "orders").await.unwrap(),
            Decision::Admitted { limit: 1, .. }
        ));
        assert!(matches!(
            limiter.evaluate("external", "orders").await.unwrap(),
            Decision::Denied { limit: 1, .. }
        ));
        assert!(matches!(
            limiter.evaluate("external", "search").await.unwrap(),
            Decision::Admitted { limit: 100, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_group_passes_through() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(1))).await;
        let entries_before = store.len();

        for _ in 0..5 {
            assert_eq!(limiter.evaluate("public", "orders").await.unwrap(), Decision::PassThrough);
        }
        assert_eq!(store.len(), entries_before);
    }

    #[tokio::test]
    async fn test_disabled_passes_through_despite_counters() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let mut doc = document(1);
        doc.enabled = false;
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(doc)).await;
        set_counter(store.as_ref(), BASE, 1_000).await;

        assert_eq!(limiter.evaluate("external", "orders").await.unwrap(), Decision::PassThrough);
        assert_eq!(counter(store.as_ref(), BASE).await, 1_000);
    }

    #[tokio::test]
    async fn test_admitted_sequence_matches_stored_counter() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let clock = clock_at(BASE, 0);
        let limiter = limiter_over(store.clone(), clock.clone(), Some(document(10))).await;

        let mut admitted = 0;
        for _ in 0..25 {
            if let Decision::Admitted { .. } = limiter.evaluate("external", "orders").await.unwrap() {
                admitted += 1;
            }
            clock.advance(chrono::Duration::seconds(2));
        }

        assert_eq!(admitted, 10);
        assert_eq!(counter(store.as_ref(), BASE).await, admitted);
    }

    #[tokio::test]
    async fn test_expire_failure_fails_decision() {
        let store = Arc::new(FlakyStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(10))).await;
        store.fail_expire(true);

        let err = limiter.evaluate("external", "orders").await.unwrap_err();
        assert!(matches!(err, LimitError::Store(_)));
        assert_eq!(store.incr_calls(), 1);
    }

    #[tokio::test]
    async fn test_counter_read_failure_fails_decision() {
        let store = Arc::new(FlakyStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(10))).await;
        store.fail_get(Some("external:"));

        assert!(limiter.evaluate("external", "orders").await.is_err());
        assert_eq!(store.incr_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_replace_leaves_state_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;
        let stored_before = store.get(DEFAULT_CONFIG_KEY).await.unwrap();

        let mut invalid = document(5);
        invalid.algorithm = "tokenBucket".to_string();
        let err = limiter.replace_config(invalid).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let err = limiter.replace_config(document(0)).await.unwrap_err();
        assert!(matches!(err, LimitError::Validation(_)));

        assert_eq!(store.get(DEFAULT_CONFIG_KEY).await.unwrap(), stored_before);
        assert_eq!(limiter.cached_config().unwrap().document(), &document(5));
    }

    #[tokio::test]
    async fn test_replace_store_failure_leaves_cache() {
        let store = Arc::new(FlakyStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;
        store.fail_set(true);

        assert!(limiter.replace_config(document(50)).await.is_err());
        assert_eq!(limiter.cached_config().unwrap().document().groups["external"].limit, 5);
    }

    #[tokio::test]
    async fn test_replace_publishes_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;

        let mut doc = document(50);
        doc.cache_ttl_secs = 0;
        let stored = limiter.replace_config(doc).await.unwrap();
        assert_eq!(stored.cache_ttl_secs, 60);

        let persisted = RateLimitConfig::from_json_slice(&store.get(DEFAULT_CONFIG_KEY).await.unwrap()).unwrap();
        assert_eq!(persisted, stored);
        assert_eq!(limiter.cached_config().unwrap().document(), &stored);
    }

    #[tokio::test]
    async fn test_set_enabled_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE, 0), Some(document(5))).await;

        assert!(!limiter.set_enabled(false).await.unwrap());
        let persisted = RateLimitConfig::from_json_slice(&store.get(DEFAULT_CONFIG_KEY).await.unwrap()).unwrap();
        assert!(!persisted.enabled);
        assert!(!limiter.cached_config().unwrap().document().enabled);
        assert_eq!(limiter.evaluate("external", "orders").await.unwrap(), Decision::PassThrough);
    }

    #[tokio::test]
    async fn test_reloaded_interval_applies_to_next_decision() {
        let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
        let limiter = limiter_over(store.clone(), clock_at(BASE + 90, 0), Some(document(10))).await;

        limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(counter(store.as_ref(), BASE + 60).await, 1);

        let mut longer = document(10);
        longer.interval_secs = 120;
        store
            .set(DEFAULT_CONFIG_KEY, longer.to_json_vec().unwrap())
            .await
            .unwrap();
        limiter.reload().await.unwrap();

        limiter.evaluate("external", "orders").await.unwrap();
        assert_eq!(counter(store.as_ref(), BASE).await, 1);
        assert_eq!(counter(store.as_ref(), BASE + 60).await, 1);
    }

    #[tokio::test]
    async fn test_slot_reports_not_initialized() {
        let slot = LimiterSlot::new();
        assert!(matches!(slot.get(), Err(LimitError::NotInitialized)));

        let limiter = limiter_over(Arc::new(MemoryStore::new()), clock_at(BASE, 0), None).await;
        assert!(slot.install(limiter.clone()).is_ok());
        assert!(slot.clone().get().is_ok());
        assert!(slot.install(limiter).is_err());
    }
}
