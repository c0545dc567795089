//! Package index engine for a package-registry backend.
//!
//! This crate provides the in-memory index behind a package feed:
//! - Parsing archive file names into package id and version
//! - Immutable, sorted snapshots with case-insensitive lookup
//! - Content stores that load eagerly, lazily or through a TTL cache
//! - A live index that watches its root and rebuilds after changes settle

pub mod config;
pub mod content;
pub mod error;
pub mod index;
pub mod indexer;
pub mod types;
pub mod watcher;

// Re-export main types
pub use config::{CacheKind, CacheStrategy, IndexConfig};
pub use content::{Content, ContentStore};
pub use error::{IndexError, Result};
pub use index::{Generation, PackageIndex};
pub use indexer::{split_id_and_version, PackageIndexSnapshot, SearchPage};
pub use types::{ContentId, IndexStatus, PackageEntry, Version, VersionEntry};
pub use watcher::DebounceState;
