//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 20;
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct PageCacheConfig {
    /// Serve cached home pages at all.
    pub enabled: bool,
    /// How long a rendered page is replayed before the handler runs again.
    pub ttl: Duration,
    /// Maximum number of distinct cached pages.
    pub capacity: usize,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for PageCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(u64::from(settings.ttl_seconds.get())),
            capacity: settings.capacity.get() as usize,
        }
    }
}

impl PageCacheConfig {
    /// Capacity as `NonZeroUsize`, clamping zero to one.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
