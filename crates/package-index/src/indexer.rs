//! Package indexing.
//!
//! This module turns a directory of archives into an index generation:
//! - Parsing archive names into package id and version
//! - Walking the packages root and deriving content ids
//! - Building the immutable snapshot and its content store

mod build;
mod filename;
mod scan;
mod snapshot;

pub use build::{build_generation, mark_readonly, unix_now_secs, zero_to_none, BuiltGeneration};
pub use filename::split_id_and_version;
pub use scan::{
    content_id_for_path, enumerate_archives, is_archive, is_symbols_archive, scan_archives,
    ArchiveFile, ARCHIVE_EXTENSION, SYMBOLS_SUFFIX,
};
pub use snapshot::{compare_ids, fold_id, PackageIndexSnapshot, SearchPage};
