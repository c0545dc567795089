//! Package content storage.
//!
//! A `ContentStore` maps the content ids of one index generation to archive
//! bytes. Three strategies trade memory for read latency:
//! - `EagerAll` - reads every archive into memory at registration
//! - `LazyNoCache` - reads from disk on every fetch
//! - `LazyTtlCache` - reads from disk on a miss and keeps the bytes under a
//!   sliding expiration
//!
//! Fetches never fail loudly: a missing mapping or an unreadable file is a
//! `None`.

mod cached;
mod eager;
mod lazy;

use std::path::Path;
use std::sync::Arc;

use crate::config::{CacheKind, CacheStrategy};
use crate::error::Result;
use crate::types::ContentId;

pub use cached::CachedContentStore;
pub use eager::EagerContentStore;
pub use lazy::LazyContentStore;

/// Archive bytes, cheap to clone out of a store.
pub type Content = Arc<[u8]>;

/// Content store for one index generation, with the strategy fixed at construction.
#[derive(Debug)]
pub enum ContentStore {
    EagerAll(EagerContentStore),
    LazyNoCache(LazyContentStore),
    LazyTtlCache(CachedContentStore),
}

impl ContentStore {
    /// Creates an empty store for the given strategy.
    pub fn new(strategy: &CacheStrategy) -> Self {
        match strategy.kind {
            CacheKind::EagerAll => Self::EagerAll(EagerContentStore::new()),
            CacheKind::LazyNoCache => Self::LazyNoCache(LazyContentStore::new()),
            CacheKind::LazyTtlCache => {
                Self::LazyTtlCache(CachedContentStore::new(strategy.sliding_expiration))
            }
        }
    }

    pub fn kind(&self) -> CacheKind {
        match self {
            Self::EagerAll(_) => CacheKind::EagerAll,
            Self::LazyNoCache(_) => CacheKind::LazyNoCache,
            Self::LazyTtlCache(_) => CacheKind::LazyTtlCache,
        }
    }

    /// Declares that `content_id` is backed by the archive at `path`.
    ///
    /// Only the eager strategy touches the disk here, and only it can fail.
    pub fn register(&mut self, content_id: ContentId, path: &Path) -> Result<()> {
        match self {
            Self::EagerAll(store) => store.register(content_id, path),
            Self::LazyNoCache(store) => {
                store.register(content_id, path);
                Ok(())
            }
            Self::LazyTtlCache(store) => {
                store.register(content_id, path);
                Ok(())
            }
        }
    }

    /// Drops every registration and every cached byte.
    pub fn reset(&mut self) {
        match self {
            Self::EagerAll(store) => store.reset(),
            Self::LazyNoCache(store) => store.reset(),
            Self::LazyTtlCache(store) => store.reset(),
        }
    }

    pub fn try_fetch(&self, content_id: &ContentId) -> Option<Content> {
        match self {
            Self::EagerAll(store) => store.try_fetch(content_id),
            Self::LazyNoCache(store) => store.try_fetch(content_id),
            Self::LazyTtlCache(store) => store.try_fetch(content_id),
        }
    }

    /// Number of registered content ids.
    pub fn len(&self) -> usize {
        match self {
            Self::EagerAll(store) => store.len(),
            Self::LazyNoCache(store) => store.len(),
            Self::LazyTtlCache(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::EagerAll(store) => store.is_empty(),
            Self::LazyNoCache(store) => store.is_empty(),
            Self::LazyTtlCache(store) => store.is_empty(),
        }
    }
}

/// Reads a whole archive, logging and swallowing any failure.
fn read_quietly(content_id: &ContentId, path: &Path) -> Option<Content> {
    match std::fs::read(path) {
        Ok(bytes) => Some(Content::from(bytes)),
        Err(error) => {
            log::debug!(
                "content fetch miss content_id={} path={} error={}",
                content_id,
                path.display(),
                error
            );
            None
        }
    }
}
