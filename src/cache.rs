//! In-memory content cache
//!
//! Whole-file bodies keyed by their normalized filesystem path. Entries are
//! inserted once and live until the owning server drops the cache; there is
//! no eviction and no size bound.
//!
//! `ContentCache` itself does no locking. Everything outside of tests reaches
//! it through [`SharedCache`], and the router holds that single mutex across
//! the whole check-load-insert sequence of a cache-eligible request.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// The cache as shared between the server and every connection handler.
pub type SharedCache = Arc<Mutex<ContentCache>>;

/// Path-keyed map of complete file contents.
///
/// Values are handed out as `Arc<[u8]>` so a response can keep sending a body
/// while other handlers keep using the cache.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: FxHashMap<String, Arc<[u8]>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache behind the mutex the router locks.
    pub fn shared() -> SharedCache {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Cached bytes for `key`, if a full load of that path has been stored.
    pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries.get(key).cloned()
    }

    /// Store `bytes` under `key` and return the cache-owned handle to them.
    ///
    /// The buffer moves into the entry; the returned `Arc` points at that same
    /// allocation. An existing entry for `key` is replaced.
    pub fn put(&mut self, key: String, bytes: Vec<u8>) -> Arc<[u8]> {
        let value: Arc<[u8]> = Arc::from(bytes);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all cached body sizes.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    /// `(key, size)` pairs sorted by key.
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        rows.sort_unstable();
        rows
    }
}

/// Cache key for a resolved file path.
pub fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
