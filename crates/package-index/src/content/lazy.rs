//! Lazy strategy: only paths are kept, every fetch reads the disk.

use std::path::{Path, PathBuf};

use fnv::FnvHashMap;

use super::{read_quietly, Content};
use crate::types::ContentId;

#[derive(Debug, Default)]
pub struct LazyContentStore {
    paths: FnvHashMap<ContentId, PathBuf>,
}

impl LazyContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, content_id: ContentId, path: &Path) {
        self.paths.insert(content_id, path.to_path_buf());
    }

    pub fn reset(&mut self) {
        self.paths.clear();
    }

    pub fn try_fetch(&self, content_id: &ContentId) -> Option<Content> {
        let path = self.paths.get(content_id)?;
        read_quietly(content_id, path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
