//! The view cache.
//!
//! Views are keyed by their signature and evicted least-recently-used. The
//! cache holds plans only, so it needs no invalidation when documents
//! change.

use crate::error::CoreResult;
use crate::query::view::View;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that compiled a view.
    pub misses: u64,
    /// Views evicted to make room.
    pub evictions: u64,
    /// Views currently cached.
    pub len: usize,
    /// Maximum number of views.
    pub capacity: usize,
}

/// A bounded, thread-safe LRU map from signature to compiled view.
pub struct ViewCache {
    views: Option<Mutex<LruCache<String, Arc<View>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ViewCache {
    /// Creates a cache holding up to `capacity` views. A capacity of zero
    /// disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            views: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the view cached under `signature`, compiling and inserting
    /// it on a miss.
    ///
    /// Compilation runs outside the lock. If another caller inserts the
    /// same signature meanwhile, its view wins and this compile is dropped.
    ///
    /// # Errors
    ///
    /// Returns the compile error; nothing is cached then.
    pub fn get_or_compile<F>(&self, signature: &str, compile: F) -> CoreResult<Arc<View>>
    where
        F: FnOnce() -> CoreResult<View>,
    {
        let Some(views) = &self.views else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compile().map(Arc::new);
        };

        if let Some(view) = views.lock().get(signature) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(signature, "view cache hit");
            return Ok(Arc::clone(view));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compile()?);
        debug!(signature, "compiled view");

        let mut views = views.lock();
        if let Some(existing) = views.get(signature) {
            return Ok(Arc::clone(existing));
        }
        if let Some((evicted, _)) = views.push(signature.to_string(), Arc::clone(&compiled)) {
            if evicted != signature {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(signature = %evicted, "evicted view");
            }
        }
        Ok(compiled)
    }

    /// Drops every cached view.
    pub fn clear(&self) {
        if let Some(views) = &self.views {
            views.lock().clear();
        }
    }

    /// Number of cached views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.as_ref().map_or(0, |views| views.lock().len())
    }

    /// Returns true if no view is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ViewCacheStats {
        ViewCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self
                .views
                .as_ref()
                .map_or(0, |views| views.lock().cap().get()),
        }
    }
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache")
            .field("stats", &self.stats())
            .finish()
    }
}
