//! Page cache keys.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use sha2::{Digest, Sha256};

/// Prefix shared by every cached home timeline page.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Identifies one cached rendering of a page for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    prefix: &'static str,
    path: String,
    query_hash: u64,
    /// Digest of the session cookie; `None` for anonymous visitors.
    viewer: Option<String>,
}

impl PageKey {
    pub fn new(path: &str, query: &str, session: Option<&str>) -> Self {
        Self {
            prefix: INDEX_PAGE_PREFIX,
            path: path.to_string(),
            query_hash: hash_query(query),
            viewer: session.map(hash_session),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_anonymous(&self) -> bool {
        self.viewer.is_none()
    }
}

/// Hash a query string for key generation.
pub fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

/// Session identifiers never sit in the cache in clear text.
fn hash_session(session: &str) -> String {
    hex::encode(Sha256::digest(session.as_bytes()))
}
