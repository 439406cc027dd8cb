//! The icon cache handle.
//!
//! [`IconCache`] owns the connection slot, the background worker, the circuit
//! breaker, the negative cache and the cleanup timers. It is cheap to clone;
//! every clone talks to the same state. No public operation returns an error:
//! failures are logged and folded into `None`, `false` or an empty value.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::Error;
use crate::background::{BackgroundQueue, Job};
use crate::breaker::{CircuitBreaker, DEGRADED_COOLDOWN, DEGRADED_THRESHOLD};
use crate::cache::entries::{MIN_PLAUSIBLE_SIZE, StoredEntry};
use crate::cache::{
    CacheDb, CacheEntry, CacheLimits, CacheStats, ConnectionSlot, EvictionReport, SettingsStore, StoreLocation,
    derive_cache_key, favicon_candidates,
};
use crate::config::AppConfig;
use crate::fetcher::IconFetcher;
use crate::lifecycle::{self, CLEANUP_GRACE, CLEANUP_RECHECK, CleanupTable, ItemCollection, Subscription};
use crate::negative::{MAX_NEGATIVE_CACHE_SIZE, NEGATIVE_CACHE_TTL, NegativeCache};
use crate::ttl::{TTL_SETTING_KEY, TtlPolicy};


/// Tunables for an [`IconCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub location: StoreLocation,
    pub limits: CacheLimits,
    pub negative_cache_ttl: Duration,
    pub negative_cache_max: usize,
    pub cleanup_grace: Duration,
    pub cleanup_recheck: Duration,
    pub degraded_threshold: u32,
    pub degraded_cooldown: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            location: StoreLocation::File(AppConfig::default().db_path),
            limits: CacheLimits::default(),
            negative_cache_ttl: NEGATIVE_CACHE_TTL,
            negative_cache_max: MAX_NEGATIVE_CACHE_SIZE,
            cleanup_grace: CLEANUP_GRACE,
            cleanup_recheck: CLEANUP_RECHECK,
            degraded_threshold: DEGRADED_THRESHOLD,
            degraded_cooldown: DEGRADED_COOLDOWN,
        }
    }
}

impl CacheOptions {
    /// Default options over a private in-memory database.
    pub fn in_memory() -> Self {
        Self { location: StoreLocation::Memory, ..Self::default() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            location: StoreLocation::File(config.db_path.clone()),
            limits: CacheLimits {
                max_total_size: config.max_total_size,
                max_entries: config.max_entries,
                max_single_size: config.max_single_size,
                eviction_batch: config.eviction_batch,
            },
            negative_cache_ttl: config.negative_cache_ttl(),
            negative_cache_max: config.negative_cache_max,
            cleanup_grace: config.cleanup_grace(),
            cleanup_recheck: config.cleanup_recheck(),
            degraded_threshold: DEGRADED_THRESHOLD,
            degraded_cooldown: config.degraded_cooldown(),
        }
    }
}

/// Builder for [`IconCache`].
pub struct IconCacheBuilder {
    options: CacheOptions,
    fetcher: Option<Arc<dyn IconFetcher>>,
    settings: Option<Arc<dyn SettingsStore>>,
}

impl IconCacheBuilder {
    /// Network bridge used by [`IconCache::refresh_icon`] and [`IconCache::resolve`].
    pub fn fetcher(mut self, fetcher: Arc<dyn IconFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Settings repository for the TTL. Defaults to the cache database itself.
    pub fn settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Create the handle and start its background worker.
    ///
    /// Must be called from within a tokio runtime. Nothing touches the
    /// database until [`IconCache::init`] or the first operation.
    pub fn build(self) -> IconCache {
        let (queue, rx) = BackgroundQueue::new();
        let options = self.options;

        let inner = Arc::new(Inner {
            slot: ConnectionSlot::new(options.location.clone()),
            breaker: CircuitBreaker::new(options.degraded_threshold, options.degraded_cooldown),
            negative: NegativeCache::new(options.negative_cache_ttl, options.negative_cache_max),
            options,
            settings: self.settings,
            fetcher: self.fetcher,
            ttl: RwLock::new(TtlPolicy::default()),
            ttl_loaded: OnceCell::new(),
            init_outcome: tokio::sync::Mutex::new(false),
            init_attempts: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            queue,
            cleanup: Arc::new(CleanupTable::default()),
            subscriptions: Mutex::new(Vec::new()),
        });

        tokio::spawn(run_worker(Arc::downgrade(&inner), rx));
        IconCache { inner }
    }
}

struct Inner {
    options: CacheOptions,
    slot: ConnectionSlot,
    settings: Option<Arc<dyn SettingsStore>>,
    fetcher: Option<Arc<dyn IconFetcher>>,
    breaker: CircuitBreaker,
    negative: NegativeCache,
    ttl: RwLock<TtlPolicy>,
    ttl_loaded: OnceCell<()>,
    /// Outcome of the most recent init attempt; held across the attempt.
    init_outcome: tokio::sync::Mutex<bool>,
    init_attempts: AtomicU64,
    ready: AtomicBool,
    destroyed: AtomicBool,
    queue: BackgroundQueue,
    cleanup: Arc<CleanupTable>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Persistent, bounded icon cache.
#[derive(Clone)]
pub struct IconCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for IconCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconCache")
            .field("location", self.inner.slot.location())
            .field("ready", &self.inner.ready.load(Ordering::Acquire))
            .field("destroyed", &self.is_destroyed())
            .field("degraded", &self.inner.breaker.is_degraded())
            .finish_non_exhaustive()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl IconCache {
    pub fn builder(options: CacheOptions) -> IconCacheBuilder {
        IconCacheBuilder { options, fetcher: None, settings: None }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Open the store, run the corruption scan and load the TTL.
    ///
    /// Idempotent. Concurrent callers share a single attempt: anyone who
    /// queued behind an in-flight attempt gets that attempt's outcome.
    pub async fn init(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        if self.inner.ready.load(Ordering::Acquire) {
            return true;
        }

        let observed = self.inner.init_attempts.load(Ordering::Acquire);
        let mut outcome = self.inner.init_outcome.lock().await;
        if self.inner.init_attempts.load(Ordering::Acquire) != observed {
            return *outcome;
        }
        if self.inner.ready.load(Ordering::Acquire) {
            return true;
        }

        let ok = self.run_init().await;
        *outcome = ok;
        self.inner.init_attempts.fetch_add(1, Ordering::AcqRel);
        ok
    }

    async fn run_init(&self) -> bool {
        let db = match self.inner.slot.get().await {
            Ok(db) => db,
            Err(e) => {
                tracing::error!(error = %e, location = ?self.inner.slot.location(), "icon cache init failed");
                self.inner.breaker.mark_init_failed();
                return false;
            }
        };

        match db.repair_corruption().await {
            Ok(report) if report.cleared => {
                tracing::warn!(
                    scanned = report.scanned,
                    corrupt = report.corrupt,
                    "corrupt icon cache entries found, cache cleared"
                );
            }
            Ok(report) => tracing::debug!(scanned = report.scanned, "icon cache integrity scan passed"),
            Err(e) => tracing::warn!(error = %e, "icon cache integrity scan failed"),
        }

        self.ensure_ttl_loaded().await;

        if self.is_destroyed() {
            return false;
        }

        self.inner.breaker.mark_init_succeeded();
        self.inner.ready.store(true, Ordering::Release);
        tracing::debug!("icon cache ready");
        true
    }

    async fn ensure_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire) || self.init().await
    }

    async fn db(&self) -> Result<CacheDb, Error> {
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }
        let db = self.inner.slot.get().await?;
        if self.is_destroyed() {
            self.inner.slot.invalidate().await;
            return Err(Error::Destroyed);
        }
        Ok(db)
    }

    async fn load(&self, cache_key: &str) -> Result<Option<StoredEntry>, Error> {
        self.db().await?.load_entry(cache_key).await
    }

    async fn store(&self, cache_key: &str, blob: &[u8], source_url: &str) -> Result<(), Error> {
        self.db().await?.put_entry(cache_key, blob, source_url, now_ms()).await
    }

    async fn record_store_failure(&self, operation: &'static str, err: &Error) {
        if matches!(err, Error::Destroyed) {
            return;
        }
        let failures = self.inner.breaker.record_failure();
        tracing::warn!(operation, error = %err, failures, "icon cache store operation failed");
        self.handle_connection_error(err).await;
    }

    async fn handle_connection_error(&self, err: &Error) {
        if err.is_connection_lost() {
            self.invalidate_connection().await;
        }
    }

    /// Look up an entry.
    ///
    /// A corrupt or implausible row is scheduled for deletion and reported
    /// as a miss. Hits get their access time bumped in the background.
    pub async fn get(&self, cache_key: &str) -> Option<CacheEntry> {
        if self.is_destroyed() || cache_key.is_empty() {
            return None;
        }
        if self.inner.breaker.is_degraded() {
            tracing::debug!(cache_key, "icon cache degraded, skipping get");
            return None;
        }
        if !self.ensure_ready().await {
            return None;
        }

        let stored = match self.load(cache_key).await {
            Ok(stored) => stored,
            Err(e) => {
                self.record_store_failure("get", &e).await;
                return None;
            }
        };
        self.inner.breaker.record_success();

        match stored?.into_entry() {
            Ok(mut entry) => {
                let at_ms = now_ms();
                self.inner
                    .queue
                    .submit(Job::Touch { cache_key: cache_key.to_string(), at_ms });
                entry.last_accessed_at = at_ms;
                tracing::debug!(cache_key, size = entry.size, "icon cache hit");
                Some(entry)
            }
            Err(reason) => {
                tracing::warn!(cache_key, %reason, "dropping corrupt icon cache entry");
                self.inner
                    .queue
                    .submit(Job::Delete { cache_key: cache_key.to_string() });
                None
            }
        }
    }

    /// Store `blob` under `cache_key`, replacing any existing entry.
    ///
    /// Empty blobs and blobs over `max_single_size` are rejected. A
    /// successful write queues an eviction pass.
    pub async fn set(&self, cache_key: &str, blob: impl AsRef<[u8]>, source_url: Option<&str>) -> bool {
        let blob = blob.as_ref();
        if self.is_destroyed() {
            return false;
        }
        if self.inner.breaker.is_degraded() {
            tracing::debug!(cache_key, "icon cache degraded, skipping set");
            return false;
        }
        if cache_key.is_empty() {
            tracing::debug!("rejected icon write with empty key");
            return false;
        }
        if blob.is_empty() {
            tracing::debug!(cache_key, "rejected empty icon");
            return false;
        }
        let max = self.inner.options.limits.max_single_size;
        if blob.len() > max {
            tracing::debug!(cache_key, size = blob.len(), max, "rejected oversized icon");
            return false;
        }
        if !self.ensure_ready().await {
            return false;
        }

        match self.store(cache_key, blob, source_url.unwrap_or_default()).await {
            Ok(()) => {
                self.inner.breaker.record_success();
                self.inner.queue.request_eviction();
                tracing::debug!(cache_key, size = blob.len(), "icon cached");
                true
            }
            Err(e) => {
                self.record_store_failure("set", &e).await;
                false
            }
        }
    }

    /// Remove one entry. Returns whether a row was deleted.
    pub async fn delete(&self, cache_key: &str) -> bool {
        if self.is_destroyed() || cache_key.is_empty() || !self.ensure_ready().await {
            return false;
        }

        let result = match self.db().await {
            Ok(db) => db.delete_entry(cache_key).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(deleted) => {
                tracing::debug!(cache_key, deleted, "icon cache delete");
                deleted
            }
            Err(e) => {
                tracing::warn!(cache_key, error = %e, "icon cache delete failed");
                self.handle_connection_error(&e).await;
                false
            }
        }
    }

    /// Remove every entry and forget every recorded failure.
    pub async fn clear(&self) -> bool {
        if self.is_destroyed() || !self.ensure_ready().await {
            return false;
        }

        self.inner.negative.clear();
        let result = match self.db().await {
            Ok(db) => db.clear_entries().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(deleted) => {
                self.inner.breaker.record_success();
                tracing::info!(deleted, "icon cache cleared");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "icon cache clear failed");
                self.handle_connection_error(&e).await;
                false
            }
        }
    }

    /// Total bytes and entry count. Zeroes when the store is unavailable.
    pub async fn get_stats(&self) -> CacheStats {
        if self.is_destroyed() || !self.ensure_ready().await {
            return CacheStats::default();
        }

        let result = match self.db().await {
            Ok(db) => db.entry_stats().await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "icon cache stats failed");
            CacheStats::default()
        })
    }

    /// Run one eviction pass now instead of waiting for the next write.
    pub async fn evict_now(&self) -> EvictionReport {
        if self.is_destroyed() || !self.ensure_ready().await {
            return EvictionReport::default();
        }
        self.evict().await
    }

    async fn evict(&self) -> EvictionReport {
        let result = match self.db().await {
            Ok(db) => db.evict_lru(&self.inner.options.limits).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(report) => {
                if report.evicted > 0 {
                    tracing::debug!(evicted = report.evicted, freed_bytes = report.freed_bytes, "icon cache evicted");
                }
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "icon cache eviction failed");
                self.handle_connection_error(&e).await;
                EvictionReport::default()
            }
        }
    }

    /// Download a fresh copy of an icon and store it.
    ///
    /// Candidates are tried in order and the first usable download wins.
    /// With no candidates, the entry's own `source_url` is retried. When
    /// every candidate fails the existing entry is left alone.
    pub async fn refresh_icon(&self, cache_key: &str, urls: &[String]) -> bool {
        if self.is_destroyed() || cache_key.is_empty() {
            return false;
        }
        let Some(fetcher) = self.inner.fetcher.clone() else {
            tracing::debug!(cache_key, "no icon fetcher configured");
            return false;
        };

        let candidates = if urls.is_empty() {
            match self.get(cache_key).await {
                Some(entry) if !entry.source_url.is_empty() => vec![entry.source_url],
                _ => {
                    tracing::debug!(cache_key, "nothing to refresh from");
                    return false;
                }
            }
        } else {
            urls.to_vec()
        };

        let max = self.inner.options.limits.max_single_size;
        for url in &candidates {
            let icon = match fetcher.fetch_icon(url).await {
                Ok(icon) => icon,
                Err(e) => {
                    tracing::debug!(cache_key, url = %url, error = %e, "icon candidate failed");
                    continue;
                }
            };

            let size = icon.bytes.len();
            if size < MIN_PLAUSIBLE_SIZE || size > max {
                tracing::debug!(cache_key, url = %url, size, "icon candidate rejected");
                continue;
            }

            if !self.set(cache_key, &icon.bytes, Some(&icon.url)).await {
                return false;
            }
            self.inner.negative.remove(cache_key);
            tracing::info!(cache_key, url = %icon.url, size, "icon refreshed");
            return true;
        }

        false
    }

    /// Find the icon for a page, downloading it when missing or stale.
    ///
    /// A miss whose every candidate fails is remembered in the negative
    /// cache so the next lookup returns `None` without touching the network.
    pub async fn resolve(&self, page_url: &str, icon_url: Option<&str>) -> Option<CacheEntry> {
        if self.is_destroyed() {
            return None;
        }
        let cache_key = derive_cache_key(page_url, icon_url);
        if cache_key.is_empty() {
            tracing::debug!(page_url, "cannot derive icon cache key");
            return None;
        }

        if let Some(entry) = self.get(&cache_key).await {
            if !self.is_stale(&entry).await {
                return Some(entry);
            }

            let mut candidates = Vec::new();
            if !entry.source_url.is_empty() {
                candidates.push(entry.source_url.clone());
            }
            for url in favicon_candidates(page_url, icon_url) {
                if !candidates.contains(&url) {
                    candidates.push(url);
                }
            }

            if self.refresh_icon(&cache_key, &candidates).await
                && let Some(fresh) = self.get(&cache_key).await
            {
                return Some(fresh);
            }
            return Some(entry);
        }

        if self.is_in_negative_cache(&cache_key) {
            tracing::debug!(cache_key, "icon lookup recently failed");
            return None;
        }
        if self.inner.fetcher.is_none() {
            return None;
        }

        let candidates = favicon_candidates(page_url, icon_url);
        if self.refresh_icon(&cache_key, &candidates).await {
            return self.get(&cache_key).await;
        }

        self.add_to_negative_cache(&cache_key);
        None
    }

    async fn settings_store(&self) -> Result<Arc<dyn SettingsStore>, Error> {
        match &self.inner.settings {
            Some(store) => Ok(Arc::clone(store)),
            None => Ok(Arc::new(self.db().await?)),
        }
    }

    async fn ensure_ttl_loaded(&self) {
        self.inner
            .ttl_loaded
            .get_or_init(|| async {
                let stored = match self.settings_store().await {
                    Ok(store) => store.get_setting(TTL_SETTING_KEY).await,
                    Err(e) => Err(e),
                };
                let policy = match stored {
                    Ok(Some(value)) => TtlPolicy::from_setting(&value).unwrap_or_else(|| {
                        tracing::warn!(%value, "invalid icon cache ttl setting, using default");
                        TtlPolicy::default()
                    }),
                    Ok(None) => TtlPolicy::default(),
                    Err(e) => {
                        tracing::warn!(error = %e, "icon cache ttl unavailable, using default");
                        TtlPolicy::default()
                    }
                };
                *self.inner.ttl.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = policy;
            })
            .await;
    }

    pub async fn get_ttl(&self) -> TtlPolicy {
        self.ensure_ttl_loaded().await;
        *self.inner.ttl.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist a new TTL, then apply it.
    pub async fn set_ttl(&self, ttl: TtlPolicy) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.ensure_ttl_loaded().await;

        let result = match self.settings_store().await {
            Ok(store) => store.put_setting(TTL_SETTING_KEY, serde_json::json!(ttl.as_millis())).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                *self.inner.ttl.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = ttl;
                tracing::info!(%ttl, "icon cache ttl updated");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist icon cache ttl");
                false
            }
        }
    }

    /// Whether `entry` has outlived the current TTL.
    pub async fn is_stale(&self, entry: &CacheEntry) -> bool {
        self.get_ttl().await.is_stale_at(entry.cached_at, now_ms())
    }

    pub fn is_in_negative_cache(&self, cache_key: &str) -> bool {
        !self.is_destroyed() && self.inner.negative.contains(cache_key)
    }

    pub fn add_to_negative_cache(&self, cache_key: &str) {
        if !self.is_destroyed() && !cache_key.is_empty() {
            self.inner.negative.insert(cache_key);
        }
    }

    pub fn remove_from_negative_cache(&self, cache_key: &str) -> bool {
        !self.is_destroyed() && self.inner.negative.remove(cache_key)
    }

    pub fn clear_negative_cache(&self) {
        self.inner.negative.clear();
    }

    pub fn is_degraded(&self) -> bool {
        self.inner.breaker.is_degraded()
    }

    /// Watch `collection` and delete icons nothing references anymore.
    ///
    /// Each released key is re-checked after `cleanup_grace` and again after
    /// `cleanup_recheck`; the entry is deleted only if both checks find no
    /// item deriving the same key.
    pub fn subscribe_to_store(&self, collection: Arc<dyn ItemCollection>) -> Subscription {
        if self.is_destroyed() {
            return Subscription::new(tokio::spawn(async {}).abort_handle());
        }

        let mut events = collection.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(inner) = weak.upgrade() else { break };
                        let cache = IconCache { inner };
                        if cache.is_destroyed() {
                            break;
                        }
                        for item in event.released_items() {
                            cache.schedule_cleanup(item.cache_key(), Arc::clone(&collection));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "item feed lagged, some deletions were missed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let subscription = Subscription::new(listener.abort_handle());
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(subscription.clone());
        subscription
    }

    fn schedule_cleanup(&self, cache_key: String, collection: Arc<dyn ItemCollection>) {
        if cache_key.is_empty() {
            return;
        }

        let grace = self.inner.options.cleanup_grace;
        let recheck = self.inner.options.cleanup_recheck;
        let weak = Arc::downgrade(&self.inner);
        let key = cache_key.clone();
        tracing::debug!(cache_key = %key, "icon cleanup scheduled");

        self.inner.cleanup.schedule(cache_key, async move {
            tokio::time::sleep(grace).await;
            if lifecycle::is_referenced(collection.as_ref(), &key) {
                tracing::debug!(cache_key = %key, "icon still referenced, keeping");
                return;
            }
            tokio::time::sleep(recheck).await;
            if lifecycle::is_referenced(collection.as_ref(), &key) {
                tracing::debug!(cache_key = %key, "icon referenced again, keeping");
                return;
            }
            if let Some(inner) = weak.upgrade() {
                IconCache { inner }.delete(&key).await;
            }
        });
    }

    /// Number of cleanups waiting on their grace window.
    pub fn pending_cleanups(&self) -> usize {
        self.inner.cleanup.len()
    }

    /// Wait until all background work queued so far has run.
    pub async fn flush(&self) {
        self.inner.queue.flush().await;
    }

    /// Drop the connection. The next operation reopens and re-initializes.
    pub async fn invalidate_connection(&self) {
        let held = self.inner.slot.invalidate().await;
        self.inner.ready.store(false, Ordering::Release);
        if held {
            tracing::info!("icon cache connection invalidated");
        }
    }

    /// Tear the cache down. Every later call is a no-op.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.cleanup.cancel_all();
        let subscriptions: Vec<Subscription> = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();
        for subscription in subscriptions {
            subscription.cancel();
        }
        self.inner.negative.clear();
        self.inner.queue.close();
        self.inner.slot.invalidate().await;
        self.inner.ready.store(false, Ordering::Release);
        tracing::info!("icon cache destroyed");
    }

    async fn run_job(&self, job: Job) {
        match job {
            Job::Touch { cache_key, at_ms } => {
                let result = match self.db().await {
                    Ok(db) => db.touch_entry(&cache_key, at_ms).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    tracing::debug!(cache_key = %cache_key, error = %e, "icon access bump failed");
                    self.handle_connection_error(&e).await;
                }
            }
            Job::Delete { cache_key } => {
                let result = match self.db().await {
                    Ok(db) => db.delete_entry(&cache_key).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    tracing::warn!(cache_key = %cache_key, error = %e, "corrupt icon delete failed");
                    self.handle_connection_error(&e).await;
                }
            }
            Job::Evict => {
                self.inner.queue.eviction_started();
                tokio::task::yield_now().await;
                self.evict().await;
            }
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn run_worker(inner: Weak<Inner>, mut jobs: UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        if let Job::Barrier(done) = job {
            let _ = done.send(());
            continue;
        }
        let Some(inner) = inner.upgrade() else { break };
        let cache = IconCache { inner };
        if cache.is_destroyed() {
            if matches!(job, Job::Evict) {
                cache.inner.queue.eviction_started();
            }
            continue;
        }
        cache.run_job(job).await;
    }
    tracing::debug!("icon cache worker stopped");
}
