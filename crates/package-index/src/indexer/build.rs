//! Building one index generation: snapshot plus its content store.

use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use fnv::FnvHashSet;

use super::scan::{scan_archives, ArchiveFile};
use super::snapshot::PackageIndexSnapshot;
use crate::config::CacheStrategy;
use crate::content::ContentStore;
use crate::error::Result;
use crate::types::ContentId;

/// A freshly built snapshot and the store that resolves its content ids.
#[derive(Debug)]
pub struct BuiltGeneration {
    pub snapshot: PackageIndexSnapshot,
    pub store: ContentStore,
}

/// Scans `root` and builds a complete generation.
///
/// Either everything succeeds or an error is returned and nothing is
/// produced; callers keep serving the previous generation on error.
pub fn build_generation(
    root: &Path,
    strategy: &CacheStrategy,
    make_readonly: bool,
) -> Result<BuiltGeneration> {
    let started = Instant::now();
    let archives = scan_archives(root)?;
    let snapshot = PackageIndexSnapshot::from_archives(&archives);

    let referenced: FnvHashSet<&ContentId> = snapshot
        .packages()
        .iter()
        .flat_map(|package| package.versions().iter().map(|entry| &entry.content_id))
        .collect();

    let mut store = ContentStore::new(strategy);
    store.reset();
    let indexed: Vec<&ArchiveFile> = archives
        .iter()
        .filter(|archive| referenced.contains(&archive.content_id))
        .collect();
    for archive in &indexed {
        store.register(archive.content_id.clone(), &archive.path)?;
    }

    if make_readonly {
        mark_readonly(indexed.iter().map(|archive| archive.path.as_path()));
    }

    log::info!(
        "package index built root={} packages={} versions={} cache={} elapsed_ms={}",
        root.display(),
        snapshot.len(),
        snapshot.version_count(),
        strategy.kind,
        started.elapsed().as_millis(),
    );

    Ok(BuiltGeneration { snapshot, store })
}

/// Sets indexed archives to `r-xr-xr-x`. Failures are logged and ignored.
#[cfg(unix)]
pub fn mark_readonly<'a>(paths: impl Iterator<Item = &'a Path>) {
    use std::os::unix::fs::PermissionsExt;

    for path in paths {
        if let Err(error) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o555)) {
            log::warn!(
                "failed to mark archive read-only path={} error={}",
                path.display(),
                error
            );
        }
    }
}

/// No chmod equivalent; read-only marking is skipped.
#[cfg(not(unix))]
pub fn mark_readonly<'a>(_paths: impl Iterator<Item = &'a Path>) {}

/// Returns the current Unix timestamp in seconds.
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

/// Converts 0 to None for optional timestamps.
pub fn zero_to_none(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
