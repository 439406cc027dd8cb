//! Reference-counted cleanup driven by an external item collection.
//!
//! Several items (bookmarks, tiles, shortcuts) can point at the same icon.
//! When one is deleted, its cache entry is removed only after a grace window,
//! and only if no remaining item still derives the same cache key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::cache::key::derive_cache_key;

/// Grace window before a deleted item's icon is considered for removal.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(5);

/// Second, shorter window before the final reference check.
pub const CLEANUP_RECHECK: Duration = Duration::from_millis(250);

/// An external item that may reference a cached icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl TrackedItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>, icon: Option<&str>) -> Self {
        Self { id: id.into(), url: url.into(), icon: icon.map(str::to_string) }
    }

    /// Cache key this item's icon is stored under.
    pub fn cache_key(&self) -> String {
        derive_cache_key(&self.url, self.icon.as_deref())
    }
}

/// Change feed emitted by an [`ItemCollection`].
#[derive(Debug, Clone)]
pub enum ItemEvent {
    Added(TrackedItem),
    Updated { previous: TrackedItem, current: TrackedItem },
    Removed(TrackedItem),
    BulkRemoved(Vec<TrackedItem>),
}

impl ItemEvent {
    /// Items whose previous reference to a cache key went away.
    pub fn released_items(&self) -> Vec<&TrackedItem> {
        match self {
            ItemEvent::Added(_) => Vec::new(),
            ItemEvent::Updated { previous, current } => {
                if previous.cache_key() == current.cache_key() {
                    Vec::new()
                } else {
                    vec![previous]
                }
            }
            ItemEvent::Removed(item) => vec![item],
            ItemEvent::BulkRemoved(items) => items.iter().collect(),
        }
    }
}

/// External mutable collection whose items reference cached icons.
pub trait ItemCollection: Send + Sync {
    /// Subscribe to the change feed.
    fn subscribe(&self) -> broadcast::Receiver<ItemEvent>;

    /// Synchronous snapshot of every item currently tracked.
    fn all_items(&self) -> Vec<TrackedItem>;
}

/// Whether any item in `collection` still maps to `cache_key`.
pub fn is_referenced(collection: &dyn ItemCollection, cache_key: &str) -> bool {
    collection
        .all_items()
        .iter()
        .any(|item| item.cache_key() == cache_key)
}

/// In-process [`ItemCollection`] backed by a vector.
#[derive(Debug)]
pub struct ItemRegistry {
    items: RwLock<Vec<TrackedItem>>,
    events: broadcast::Sender<ItemEvent>,
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { items: RwLock::new(Vec::new()), events }
    }

    /// Add an item, replacing any existing item with the same id.
    pub fn insert(&self, item: TrackedItem) {
        let previous = {
            let mut items = self.write();
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => Some(std::mem::replace(existing, item.clone())),
                None => {
                    items.push(item.clone());
                    None
                }
            }
        };

        let event = match previous {
            Some(previous) => ItemEvent::Updated { previous, current: item },
            None => ItemEvent::Added(item),
        };
        let _ = self.events.send(event);
    }

    pub fn remove(&self, id: &str) -> Option<TrackedItem> {
        let removed = {
            let mut items = self.write();
            let index = items.iter().position(|item| item.id == id)?;
            items.remove(index)
        };
        let _ = self.events.send(ItemEvent::Removed(removed.clone()));
        Some(removed)
    }

    /// Remove several items at once, emitting a single bulk event.
    pub fn remove_many(&self, ids: &[&str]) -> Vec<TrackedItem> {
        let removed: Vec<TrackedItem> = {
            let mut items = self.write();
            let (gone, kept): (Vec<_>, Vec<_>) = items.drain(..).partition(|item| ids.contains(&item.id.as_str()));
            *items = kept;
            gone
        };
        if !removed.is_empty() {
            let _ = self.events.send(ItemEvent::BulkRemoved(removed.clone()));
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<TrackedItem>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ItemCollection for ItemRegistry {
    fn subscribe(&self) -> broadcast::Receiver<ItemEvent> {
        self.events.subscribe()
    }

    fn all_items(&self) -> Vec<TrackedItem> {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

/// Handle to a change-feed subscription.
///
/// Cancelling stops the listener; calling it again is harmless.
#[derive(Debug, Clone)]
pub struct Subscription {
    abort: AbortHandle,
}

impl Subscription {
    pub(crate) fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.abort.is_finished()
    }
}

#[derive(Debug)]
struct PendingCleanup {
    id: u64,
    abort: AbortHandle,
}

/// Per-key table of debounced cleanup tasks.
#[derive(Debug, Default)]
pub struct CleanupTable {
    pending: Mutex<HashMap<String, PendingCleanup>>,
    next_id: AtomicU64,
}

impl CleanupTable {
    /// Run `work` for `cache_key`, replacing any task already pending for it.
    pub fn schedule<F>(self: &Arc<Self>, cache_key: String, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.lock();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = Arc::clone(self);
        let task_key = cache_key.clone();
        let handle = tokio::spawn(async move {
            work.await;
            table.finish(&task_key, id);
        });

        if let Some(replaced) = pending.insert(cache_key, PendingCleanup { id, abort: handle.abort_handle() }) {
            replaced.abort.abort();
        }
    }

    /// Cancel the pending task for `cache_key`, if any.
    pub fn cancel(&self, cache_key: &str) -> bool {
        match self.lock().remove(cache_key) {
            Some(task) => {
                task.abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, task) in self.lock().drain() {
            task.abort.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(&self, cache_key: &str, id: u64) {
        let mut pending = self.lock();
        if pending.get(cache_key).is_some_and(|task| task.id == id) {
            pending.remove(cache_key);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCleanup>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_registry_events() {
        let registry = ItemRegistry::new();
        let mut rx = registry.subscribe();

        registry.insert(TrackedItem::new("1", "https://a.example", None));
        registry.insert(TrackedItem::new("1", "https://b.example", None));
        registry.remove("1");

        assert!(matches!(rx.try_recv(), Ok(ItemEvent::Added(_))));
        assert!(matches!(rx.try_recv(), Ok(ItemEvent::Updated { .. })));
        assert!(matches!(rx.try_recv(), Ok(ItemEvent::Removed(item)) if item.url == "https://b.example"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_many_emits_one_event() {
        let registry = ItemRegistry::new();
        for id in ["1", "2", "3"] {
            registry.insert(TrackedItem::new(id, format!("https://{id}.example"), None));
        }
        let mut rx = registry.subscribe();

        let removed = registry.remove_many(&["1", "3", "missing"]);
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(matches!(rx.try_recv(), Ok(ItemEvent::BulkRemoved(items)) if items.len() == 2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_released_items() {
        let a = TrackedItem::new("1", "https://a.example/x", None);
        let same_site = TrackedItem::new("1", "https://a.example/y", None);
        let other_site = TrackedItem::new("1", "https://b.example", None);

        assert!(ItemEvent::Added(a.clone()).released_items().is_empty());
        assert!(
            ItemEvent::Updated { previous: a.clone(), current: same_site }
                .released_items()
                .is_empty()
        );
        assert_eq!(
            ItemEvent::Updated { previous: a.clone(), current: other_site }
                .released_items()
                .len(),
            1
        );
        assert_eq!(ItemEvent::BulkRemoved(vec![a.clone(), a]).released_items().len(), 2);
    }

    #[test]
    fn test_is_referenced() {
        let registry = ItemRegistry::new();
        registry.insert(TrackedItem::new("1", "https://a.example/page", None));
        let key = derive_cache_key("https://a.example/other", None);
        assert!(is_referenced(&registry, &key));
        assert!(!is_referenced(&registry, &derive_cache_key("https://b.example", None)));
    }

    #[tokio::test]
    async fn test_reschedule_replaces_pending() {
        let table = Arc::new(CleanupTable::default());
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            table.schedule("k".to_string(), async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(table.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let table = Arc::new(CleanupTable::default());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        table.schedule("k".to_string(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(table.cancel("k"));
        assert!(!table.cancel("k"));
        table.cancel_all();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
