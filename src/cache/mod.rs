//! Whole-page cache for the home timeline.
//!
//! Rendered responses are replayed for a short TTL, configured under
//! `[cache]` in `blogroll.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! capacity = 256
//! ```
//!
//! Writes never invalidate entries; within the TTL a visitor may see a page
//! that predates the newest post.

mod config;
mod keys;
mod middleware;
mod store;

pub use config::PageCacheConfig;
pub use keys::{INDEX_PAGE_PREFIX, PageKey, hash_query};
pub use middleware::{PageCacheState, page_cache_layer};
pub use store::{CachedResponse, Clock, PageCache, SystemClock};
