//! In-memory memo of recent icon lookup failures.
//!
//! Never persisted and never consulted by get/set. Callers check it before
//! going to the network so a dead icon URL is not retried on every render.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a failure is remembered (24 hours).
pub const NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Most failures remembered at once.
pub const MAX_NEGATIVE_CACHE_SIZE: usize = 200;

/// Bounded, time-limited set of keys whose last fetch failed.
#[derive(Debug)]
pub struct NegativeCache {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for NegativeCache {
    fn default() -> Self {
        Self::new(NEGATIVE_CACHE_TTL, MAX_NEGATIVE_CACHE_SIZE)
    }
}

impl NegativeCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, max_entries: max_entries.max(1) }
    }

    /// Whether `key` failed recently. Expired keys are purged on the way out.
    pub fn contains(&self, key: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(failed_at) if failed_at.elapsed() > self.ttl => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Record a failure for `key` at the current time.
    ///
    /// Expired entries are dropped first; if the map is still full, the oldest
    /// failures are evicted to make room.
    pub fn insert(&self, key: &str) {
        let mut entries = self.lock();
        let ttl = self.ttl;
        entries.retain(|_, failed_at| failed_at.elapsed() <= ttl);

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            let mut by_age: Vec<(String, Instant)> = entries.iter().map(|(k, t)| (k.clone(), *t)).collect();
            by_age.sort_by_key(|(_, failed_at)| *failed_at);
            let excess = entries.len() + 1 - self.max_entries;
            for (stale, _) in by_age.into_iter().take(excess) {
                entries.remove(&stale);
            }
        }

        entries.insert(key.to_string(), Instant::now());
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
