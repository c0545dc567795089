//! Lazy strategy with an in-memory sliding-expiration cache.
//!
//! The cache is unbounded in size. An entry expires once it has gone
//! `sliding_expiration` without being fetched; expiry is checked on access,
//! so an expired entry is simply a cold read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fnv::FnvHashMap;
use moka::sync::Cache;

use super::{read_quietly, Content};
use crate::types::ContentId;

#[derive(Debug)]
pub struct CachedContentStore {
    paths: FnvHashMap<ContentId, PathBuf>,
    cache: Cache<ContentId, Content>,
    sliding_expiration: Duration,
}

impl CachedContentStore {
    pub fn new(sliding_expiration: Duration) -> Self {
        Self {
            paths: FnvHashMap::default(),
            cache: build_cache(sliding_expiration),
            sliding_expiration,
        }
    }

    pub fn register(&mut self, content_id: ContentId, path: &Path) {
        self.paths.insert(content_id, path.to_path_buf());
    }

    /// Clears the paths and swaps in a fresh cache; entries carry their own
    /// timers, so the old cache is discarded whole.
    pub fn reset(&mut self) {
        self.paths.clear();
        self.cache.invalidate_all();
        self.cache = build_cache(self.sliding_expiration);
    }

    pub fn try_fetch(&self, content_id: &ContentId) -> Option<Content> {
        if let Some(content) = self.cache.get(content_id) {
            return Some(content);
        }

        let path = self.paths.get(content_id)?;
        let content = read_quietly(content_id, path)?;
        self.cache.insert(content_id.clone(), content.clone());
        Some(content)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn sliding_expiration(&self) -> Duration {
        self.sliding_expiration
    }

    /// Approximate number of cached archives.
    pub fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

fn build_cache(sliding_expiration: Duration) -> Cache<ContentId, Content> {
    Cache::builder().time_to_idle(sliding_expiration).build()
}
