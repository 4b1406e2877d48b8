//! Request routing
//!
//! Maps a parsed [`Request`] to a [`Response`]:
//!
//! 1. `/` serves the default document.
//! 2. Targets starting with `/index.html` serve the index document.
//! 3. Anything else is normalized and looked up under the document root;
//!    a missing or unreadable file serves the not-found document with a 404.
//!
//! Requests without a `Range` header go through the content cache. The cache
//! mutex is held for the whole lookup/load/insert sequence, so two handlers
//! can never load the same path twice. Ranged requests read the requested span
//! straight from disk, never take the lock, and never populate the cache.

use crate::cache::{cache_key, SharedCache};
use crate::loader::{FileLoader, FsLoader};
use crate::request::{ByteRange, Request};
use crate::response::{Body, Response, Status};
use crate::sanitize_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Document root and the three fixed documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub root: PathBuf,
    pub default_page: PathBuf,
    pub index_page: PathBuf,
    pub not_found_page: PathBuf,
}

impl Documents {
    /// Fixed documents named relative to `root`.
    pub fn under(
        root: impl Into<PathBuf>,
        default_page: &str,
        index_page: &str,
        not_found_page: &str,
    ) -> Self {
        let root = root.into();
        Self {
            default_page: root.join(default_page),
            index_page: root.join(index_page),
            not_found_page: root.join(not_found_page),
            root,
        }
    }
}

/// Where a request ends up on disk, and with which status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub file: PathBuf,
    pub status: Status,
}

pub struct Router<L = FsLoader> {
    documents: Documents,
    cache: SharedCache,
    loader: L,
}

impl<L: FileLoader> Router<L> {
    pub fn new(documents: Documents, cache: SharedCache, loader: L) -> Self {
        Self {
            documents,
            cache,
            loader,
        }
    }

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Pick the file and status for a request target.
    pub fn resolve(&self, path: &str) -> Target {
        if path == "/" {
            return self.found(&self.documents.default_page);
        }
        if path.starts_with("/index.html") {
            return self.found(&self.documents.index_page);
        }
        if path.is_empty() {
            return self.not_found();
        }

        let relative = sanitize_path(path);
        let file = self.documents.root.join(relative.trim_start_matches('/'));
        if self.loader.is_accessible(&file) {
            Target {
                file,
                status: Status::Ok,
            }
        } else {
            self.not_found()
        }
    }

    /// Produce the response for one request. Blocks on filesystem I/O and,
    /// for cache-eligible requests, on the cache lock. Ranged requests never
    /// lock or touch the cache.
    pub fn route(&self, request: &Request) -> Response {
        let target = self.resolve(&request.path);
        if request.is_cache_eligible() {
            return self.serve_cached(&target);
        }

        match request.range {
            Some(range) if target.status == Status::Ok => self.serve_range(&target, range),
            // The not-found page is never a partial resource.
            _ => self.serve_uncached(&target),
        }
    }

    fn serve_cached(&self, target: &Target) -> Response {
        let key = cache_key(&target.file);
        let mut cache = self.cache.lock();

        if let Some(bytes) = cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Response::new(target.status, Body::Cached(bytes));
        }

        match self.loader.load(&target.file) {
            Ok(bytes) => {
                debug!(key = %key, bytes = bytes.len(), "cache fill");
                let bytes = cache.put(key, bytes);
                Response::new(target.status, Body::Cached(bytes))
            }
            Err(e) => {
                error!("{e}");
                Response::internal_error()
            }
        }
    }

    fn serve_range(&self, target: &Target, range: ByteRange) -> Response {
        match self.loader.load_range(&target.file, range) {
            Ok(bytes) => {
                debug!(
                    file = %target.file.display(),
                    start = range.start,
                    end = ?range.end,
                    bytes = bytes.len(),
                    "ranged read"
                );
                Response::new(target.status, Body::Owned(bytes))
            }
            Err(e) => {
                error!("{e}");
                Response::internal_error()
            }
        }
    }

    fn serve_uncached(&self, target: &Target) -> Response {
        match self.loader.load(&target.file) {
            Ok(bytes) => Response::new(target.status, Body::Owned(bytes)),
            Err(e) => {
                error!("{e}");
                Response::internal_error()
            }
        }
    }

    fn found(&self, file: &Path) -> Target {
        Target {
            file: file.to_path_buf(),
            status: Status::Ok,
        }
    }

    fn not_found(&self) -> Target {
        Target {
            file: self.documents.not_found_page.clone(),
            status: Status::NotFound,
        }
    }
}

/// Route on the blocking pool so file reads and the cache lock stay off the
/// async workers.
pub async fn route_blocking<L: FileLoader>(router: Arc<Router<L>>, request: Request) -> Response {
    match tokio::task::spawn_blocking(move || router.route(&request)).await {
        Ok(response) => response,
        Err(e) => {
            error!("routing task failed: {e}");
            Response::internal_error()
        }
    }
}
