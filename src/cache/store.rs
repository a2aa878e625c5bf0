//! TTL-bounded storage for rendered pages.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use tracing::warn;

use super::config::PageCacheConfig;
use super::keys::PageKey;

/// Time source for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cached HTTP response.
#[derive(Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    expires_at: Instant,
}

/// Rendered pages replayed until their TTL lapses.
///
/// Entries expire lazily: a read past `expires_at` drops the entry and reports
/// a miss. Capacity overflow evicts the least recently used page.
pub struct PageCache {
    entries: RwLock<LruCache<PageKey, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PageCache {
    pub fn new(config: &PageCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &PageCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            ttl: config.ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &PageKey) -> Option<CachedResponse> {
        let now = self.clock.now();
        let mut entries = self.write_entries("get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.response.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a response; returns the key evicted to make room, if any.
    pub fn set(&self, key: PageKey, response: CachedResponse) -> Option<PageKey> {
        let entry = Entry {
            response,
            expires_at: self.clock.now() + self.ttl,
        };
        self.write_entries("set")
            .push(key.clone(), entry)
            .and_then(|(evicted, _)| (evicted != key).then_some(evicted))
    }

    /// Drop every cached page.
    pub fn clear(&self) {
        self.write_entries("clear").clear();
    }

    pub fn len(&self) -> usize {
        self.read_entries("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries stay consistent across a panic; poisoned locks are logged and reused.
    fn write_entries(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<PageKey, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!(cache = "page", op, "page cache lock was poisoned; reusing entries");
            PoisonError::into_inner(poisoned)
        })
    }

    fn read_entries(&self, op: &'static str) -> RwLockReadGuard<'_, LruCache<PageKey, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!(cache = "page", op, "page cache lock was poisoned; reusing entries");
            PoisonError::into_inner(poisoned)
        })
    }
}
