//! Eager strategy: all archive bytes live in memory.

use std::path::Path;

use fnv::FnvHashMap;

use super::Content;
use crate::error::{io_error_at, Result};
use crate::types::ContentId;

#[derive(Debug, Default)]
pub struct EagerContentStore {
    contents: FnvHashMap<ContentId, Content>,
}

impl EagerContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the archive now. A file that cannot be read fails the registration.
    pub fn register(&mut self, content_id: ContentId, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|error| io_error_at("read archive", path, error))?;
        self.contents.insert(content_id, Content::from(bytes));
        Ok(())
    }

    pub fn reset(&mut self) {
        self.contents.clear();
    }

    pub fn try_fetch(&self, content_id: &ContentId) -> Option<Content> {
        self.contents.get(content_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Total bytes held in memory.
    pub fn resident_bytes(&self) -> usize {
        self.contents.values().map(|content| content.len()).sum()
    }
}
