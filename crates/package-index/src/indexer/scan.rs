//! Archive enumeration.
//!
//! Walks the packages root in parallel, keeps `*.nupkg` files that are not
//! symbol archives, and derives a content id for each from its path.

use std::fs;
use std::hash::Hasher;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fnv::{FnvHashSet, FnvHasher};
use rayon::prelude::*;

use super::filename::split_id_and_version;
use crate::error::{io_error_at, IndexError, Result};
use crate::types::{ContentId, Version};

/// Extension of indexed archives.
pub const ARCHIVE_EXTENSION: &str = "nupkg";

/// Suffix of symbol archives, which are never indexed.
pub const SYMBOLS_SUFFIX: &str = ".symbols.nupkg";

/// One archive found on disk, parsed and given a content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub id: String,
    pub version: Version,
    pub content_id: ContentId,
}

/// Returns true if the path names a package archive (symbol archives included).
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|extension| extension.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        .unwrap_or(false)
}

/// Returns true if the path names a symbol archive.
pub fn is_symbols_archive(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(SYMBOLS_SUFFIX)
        })
        .unwrap_or(false)
}

/// Enumerates every archive below `root`, sorted by path.
///
/// The root itself must be readable. Subdirectories that vanish mid-walk are
/// skipped; any other read failure aborts the enumeration.
pub fn enumerate_archives(root: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(root).map_err(|error| match error.kind() {
        ErrorKind::NotFound => IndexError::PathNotFound(root.to_path_buf()),
        _ => io_error_at("access packages root", root, error),
    })?;
    if !metadata.is_dir() {
        return Err(IndexError::InvalidInput(format!(
            "packages root is not a directory: {}",
            root.display()
        )));
    }

    let mut archives = walk(root, true)?;
    archives.sort();
    Ok(archives)
}

fn walk(dir: &Path, is_root: bool) -> Result<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(error) if !is_root && error.kind() == ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(error) => return Err(io_error_at("read directory", dir, error)),
    };

    let entries: Vec<_> = read_dir.filter_map(|entry| entry.ok()).collect();

    let nested: Vec<Vec<PathBuf>> = entries
        .into_par_iter()
        .map(|entry| {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                return Ok(Vec::new());
            };

            if file_type.is_dir() {
                walk(&path, false)
            } else if is_archive(&path) && (file_type.is_file() || path.is_file()) {
                Ok(vec![path])
            } else {
                Ok(Vec::new())
            }
        })
        .collect::<Result<_>>()?;

    Ok(nested.into_iter().flatten().collect())
}

/// Derives a content id from an archive path.
///
/// `salt` is non-zero only when disambiguating a hash collision.
pub fn content_id_for_path(path: &Path, salt: u32) -> ContentId {
    let mut hasher = FnvHasher::default();
    hasher.write(path.to_string_lossy().as_bytes());
    if salt != 0 {
        hasher.write_u32(salt);
    }
    ContentId::new(format!("{:016x}", hasher.finish()))
}

/// Scans the root: enumerates archives, drops symbol archives and files that
/// vanished since enumeration, then parses names and assigns content ids.
///
/// Content ids are unique within the returned list.
pub fn scan_archives(root: &Path) -> Result<Vec<ArchiveFile>> {
    let paths = enumerate_archives(root)?;

    let mut assigned: FnvHashSet<ContentId> =
        FnvHashSet::with_capacity_and_hasher(paths.len(), Default::default());
    let mut archives = Vec::with_capacity(paths.len());

    for path in paths {
        if is_symbols_archive(&path) || !path.is_file() {
            continue;
        }

        let stem = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let (id, version) = split_id_and_version(&stem);

        let mut salt = 0;
        let mut content_id = content_id_for_path(&path, salt);
        while assigned.contains(&content_id) {
            salt += 1;
            content_id = content_id_for_path(&path, salt);
        }
        assigned.insert(content_id.clone());

        archives.push(ArchiveFile {
            path,
            id,
            version,
            content_id,
        });
    }

    Ok(archives)
}
