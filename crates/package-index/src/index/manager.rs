//! PackageIndex - main API for package lookups.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Sender;
use notify::RecommendedWatcher;
use parking_lot::Mutex;

use super::shared::{Generation, SharedPackageIndex};
use crate::config::IndexConfig;
use crate::content::{Content, ContentStore};
use crate::error::{canonicalize_existing_path, IndexError, Result};
use crate::indexer::{zero_to_none, PackageIndexSnapshot};
use crate::types::{ContentId, IndexStatus, Version};
use crate::watcher::{create_index_watcher, run_debounce_loop, DebounceState, WatcherEvent};

/// Live index of a packages directory.
///
/// Reads go through [`PackageIndex::query`] (or the lookups built on it) and
/// always see one snapshot together with its own content store. A rebuild,
/// triggered by debounced filesystem changes or by [`PackageIndex::rescan`],
/// replaces both at once.
///
/// Read operations must not be nested: calling back into the index from
/// inside a `query` closure can deadlock behind a waiting rebuild.
pub struct PackageIndex {
    shared: Arc<SharedPackageIndex>,
    event_tx: Sender<WatcherEvent>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    debounce_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PackageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageIndex")
            .field("shared", &self.shared)
            .field("watcher", &self.watcher.lock().is_some())
            .finish()
    }
}

impl PackageIndex {
    /// Scans the packages root, then starts watching it.
    ///
    /// An invalid root or a failed initial scan is returned as an error. A
    /// watcher that cannot start only disables automatic rebuilds.
    pub fn open(config: IndexConfig) -> Result<Self> {
        let init_started = Instant::now();
        config.validate()?;
        let root = canonicalize_existing_path(config.packages.clone());

        let shared = Arc::new(SharedPackageIndex::open(
            root.clone(),
            config.cache.clone(),
            config.make_readonly,
        )?);

        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let thread_shared = shared.clone();
        let delay = config.debounce;
        let debounce_thread = thread::Builder::new()
            .name("package-index-debounce".to_string())
            .spawn(move || {
                run_debounce_loop(
                    delay,
                    &event_rx,
                    &thread_shared.debounce_state,
                    &thread_shared.events_suspended,
                    || {
                        // Failures are logged and recorded by `rebuild`.
                        let _ = thread_shared.rebuild();
                    },
                );
            })
            .map_err(|error| {
                IndexError::Internal(format!("failed to spawn debounce thread: {error}"))
            })?;

        let watcher = if config.watch {
            match create_index_watcher(&root, shared.events_suspended.clone(), event_tx.clone()) {
                Ok(watcher) => Some(watcher),
                Err(error) => {
                    log::warn!(
                        "package watcher disabled for {}: {}",
                        root.display(),
                        error
                    );
                    None
                }
            }
        } else {
            None
        };

        {
            let current = shared.current.read();
            log::info!(
                "package index init root={} cache={} packages={} versions={} watcher_enabled={} total_init_ms={}",
                root.display(),
                config.cache.kind,
                current.snapshot.len(),
                current.snapshot.version_count(),
                watcher.is_some(),
                init_started.elapsed().as_millis(),
            );
        }

        Ok(Self {
            shared,
            event_tx,
            watcher: Mutex::new(watcher),
            debounce_thread: Some(debounce_thread),
        })
    }

    /// Runs `f` against the current snapshot and its content store under the
    /// shared lock. Any number of queries may run at once; a rebuild waits
    /// for them, and queries arriving during a rebuild wait for it.
    pub fn query<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&PackageIndexSnapshot, &ContentStore) -> T,
    {
        let current = self.shared.current.read();
        f(&current.snapshot, &current.store)
    }

    /// Position of a package in the current snapshot, ignoring case.
    /// Blank or unknown ids give `None`.
    pub fn find_package_index(&self, id: &str) -> Option<usize> {
        if id.trim().is_empty() {
            return None;
        }
        self.query(|snapshot, _| snapshot.find_package_index(id))
    }

    /// Content id of the exact `(id, version)` pair in the current snapshot.
    pub fn find_content_id(&self, id: &str, version: Version) -> Option<ContentId> {
        if id.trim().is_empty() {
            return None;
        }
        self.query(|snapshot, _| snapshot.find_content_id(id, version).cloned())
    }

    /// Archive bytes for a content id of the current generation.
    pub fn fetch(&self, content_id: &ContentId) -> Option<Content> {
        self.query(|_, store| store.try_fetch(content_id))
    }

    /// Takes shared ownership of the current generation.
    ///
    /// The returned handles stay valid after later rebuilds; they are just
    /// no longer current.
    pub fn generation(&self) -> Generation {
        self.shared.current.read().clone()
    }

    /// Rebuilds immediately on the calling thread.
    pub fn rescan(&self) -> Result<()> {
        self.shared.rebuild()
    }

    /// Schedules a debounced rebuild as if the filesystem had changed.
    pub fn schedule_rebuild(&self) {
        let _ = self.event_tx.send(WatcherEvent::RescanRequired);
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    pub fn status(&self) -> IndexStatus {
        let (generation, packages, versions) = {
            let current = self.shared.current.read();
            (
                current.number,
                current.snapshot.len(),
                current.snapshot.version_count(),
            )
        };

        IndexStatus {
            state: DebounceState::load(&self.shared.debounce_state)
                .as_str()
                .to_string(),
            root: self.shared.root.to_string_lossy().to_string(),
            cache: self.shared.strategy.kind.to_string(),
            generation,
            packages,
            versions,
            rebuild_count: self.shared.rebuild_count.load(Ordering::Relaxed),
            last_rebuild_at: zero_to_none(self.shared.last_rebuild_at.load(Ordering::Relaxed)),
            last_error: self.shared.last_error.lock().clone(),
            watcher_enabled: self.watcher.lock().is_some(),
        }
    }
}

impl Drop for PackageIndex {
    fn drop(&mut self) {
        // Stop the event source before the consumer.
        self.watcher.get_mut().take();
        let _ = self.event_tx.send(WatcherEvent::Shutdown);
        if let Some(handle) = self.debounce_thread.take() {
            if handle.join().is_err() {
                log::warn!("package index debounce thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheStrategy;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Barrier;
    use std::time::Duration;
    use tempfile::TempDir;

    fn packages_dir(temp: &TempDir) -> PathBuf {
        let dir = temp.path().join("packages");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) {
        fs::write(dir.join(name), bytes).unwrap();
    }

    fn open_unwatched(dir: &Path, cache: CacheStrategy) -> PackageIndex {
        PackageIndex::open(IndexConfig::new(dir).with_cache(cache).with_watch(false)).unwrap()
    }

    fn v(major: u32) -> Version {
        Version::new(major, 0, 0, 0)
    }

    fn ids(snapshot: &PackageIndexSnapshot) -> BTreeSet<String> {
        snapshot
            .packages()
            .iter()
            .map(|package| package.id().to_string())
            .collect()
    }

    #[test]
    fn lookups_follow_indexed_archives() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "A.1.0.0.0.nupkg", b"a1");
        write(&dir, "B.1.0.0.0.nupkg", b"b1");
        write(&dir, "B.2.0.0.0.nupkg", b"b2");

        let index = open_unwatched(&dir, CacheStrategy::eager_all());

        let content_id = index.find_content_id("b", v(2)).expect("B 2.0.0.0");
        assert_eq!(&index.fetch(&content_id).unwrap()[..], b"b2");
        assert!(index.find_content_id("c", v(1)).is_none());
        assert!(index.find_content_id("b", v(3)).is_none());

        assert_eq!(index.find_package_index("A"), Some(0));
        assert_eq!(index.find_package_index("b"), Some(1));
        assert_eq!(index.find_package_index("c"), None);
        assert_eq!(index.find_package_index(" "), None);
    }

    #[test]
    fn query_pairs_snapshot_with_its_store() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo");

        for cache in [
            CacheStrategy::eager_all(),
            CacheStrategy::lazy_no_cache(),
            CacheStrategy::lazy_ttl_cache(Duration::from_secs(60)),
        ] {
            let index = open_unwatched(&dir, cache);
            let resolved = index.query(|snapshot, store| {
                snapshot
                    .packages()
                    .iter()
                    .flat_map(|package| package.versions())
                    .all(|entry| store.try_fetch(&entry.content_id).is_some())
            });
            assert!(resolved);
        }
    }

    #[test]
    fn rescan_publishes_a_new_generation() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo1");

        let index = open_unwatched(&dir, CacheStrategy::eager_all());
        let before = index.generation();
        assert_eq!(before.number, 0);

        write(&dir, "Foo.2.0.nupkg", b"foo2");
        write(&dir, "Bar.1.0.nupkg", b"bar1");
        index.rescan().unwrap();

        let after = index.generation();
        assert_eq!(after.number, 1);
        assert_eq!(after.snapshot.len(), 2);
        assert_eq!(
            after.snapshot.find_package("foo").unwrap().latest_version(),
            v(2)
        );

        // The old generation is still whole for whoever holds it.
        assert_eq!(before.snapshot.len(), 1);
        let old_id = before.snapshot.find_content_id("Foo", v(1)).unwrap();
        assert_eq!(&before.store.try_fetch(old_id).unwrap()[..], b"foo1");

        let status = index.status();
        assert_eq!(status.generation, 1);
        assert_eq!(status.rebuild_count, 1);
        assert_eq!(status.packages, 2);
        assert_eq!(status.versions, 3);
        assert_eq!(status.cache, "eager-all");
        assert!(status.last_rebuild_at.is_some());
    }

    #[test]
    fn removed_archives_disappear_after_rescan() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo1");
        write(&dir, "Bar.1.0.nupkg", b"bar1");

        let index = open_unwatched(&dir, CacheStrategy::lazy_no_cache());
        fs::remove_file(dir.join("Bar.1.0.nupkg")).unwrap();
        index.rescan().unwrap();

        assert_eq!(index.find_package_index("bar"), None);
        assert!(index.find_content_id("foo", v(1)).is_some());
    }

    #[test]
    fn failed_rescan_keeps_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo1");

        let index = open_unwatched(&dir, CacheStrategy::eager_all());
        fs::remove_dir_all(&dir).unwrap();

        assert!(index.rescan().is_err());
        let content_id = index.find_content_id("foo", v(1)).expect("still indexed");
        assert_eq!(&index.fetch(&content_id).unwrap()[..], b"foo1");

        let status = index.status();
        assert_eq!(status.generation, 0);
        assert_eq!(status.rebuild_count, 0);
        assert!(status.last_error.is_some());
    }

    #[test]
    fn open_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = PackageIndex::open(IndexConfig::new(temp.path().join("absent")));
        assert!(matches!(result, Err(IndexError::PathNotFound(_))));
    }

    #[test]
    fn concurrent_queries_observe_one_generation() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Old.A.1.0.nupkg", b"old-a");
        write(&dir, "Old.B.1.0.nupkg", b"old-b");

        let index = open_unwatched(&dir, CacheStrategy::eager_all());
        let old_ids: BTreeSet<String> = ["Old.A", "Old.B"].iter().map(|s| s.to_string()).collect();
        let new_ids: BTreeSet<String> =
            ["New.A", "New.B", "New.C"].iter().map(|s| s.to_string()).collect();

        let readers = 8;
        let barrier = Barrier::new(readers + 1);

        thread::scope(|scope| {
            for _ in 0..readers {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..200 {
                        index.query(|snapshot, store| {
                            let seen = ids(snapshot);
                            assert!(
                                seen == old_ids || seen == new_ids,
                                "mixed snapshot: {seen:?}"
                            );
                            for package in snapshot.packages() {
                                assert!(store.try_fetch(package.latest_content_id()).is_some());
                            }
                        });
                    }
                });
            }

            barrier.wait();
            fs::remove_file(dir.join("Old.A.1.0.nupkg")).unwrap();
            fs::remove_file(dir.join("Old.B.1.0.nupkg")).unwrap();
            write(&dir, "New.A.1.0.nupkg", b"new-a");
            write(&dir, "New.B.1.0.nupkg", b"new-b");
            write(&dir, "New.C.1.0.nupkg", b"new-c");
            index.rescan().unwrap();
        });

        assert_eq!(ids(&index.generation().snapshot), new_ids);
    }

    #[test]
    fn scheduled_rebuilds_are_coalesced() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo1");

        let index = PackageIndex::open(
            IndexConfig::new(&dir)
                .with_watch(false)
                .with_debounce(Duration::from_millis(300)),
        )
        .unwrap();

        for _ in 0..10 {
            index.schedule_rebuild();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(index.status().state, "pending");

        thread::sleep(Duration::from_millis(1200));
        let status = index.status();
        assert_eq!(status.rebuild_count, 1);
        assert_eq!(status.state, "idle");
    }

    #[test]
    fn watcher_picks_up_new_archives() {
        let temp = TempDir::new().unwrap();
        let dir = packages_dir(&temp);
        write(&dir, "Foo.1.0.nupkg", b"foo1");

        let index = PackageIndex::open(
            IndexConfig::new(&dir)
                .with_cache(CacheStrategy::lazy_no_cache())
                .with_debounce(Duration::from_millis(200)),
        )
        .unwrap();
        if !index.status().watcher_enabled {
            // No filesystem notifications available here.
            return;
        }

        fs::create_dir(dir.join("nested")).unwrap();
        write(&dir.join("nested"), "Bar.3.1.nupkg", b"bar");

        let deadline = Instant::now() + Duration::from_secs(10);
        while index.find_package_index("bar").is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }

        let content_id = index
            .find_content_id("Bar", Version::new(3, 1, 0, 0))
            .expect("new archive indexed");
        assert_eq!(&index.fetch(&content_id).unwrap()[..], b"bar");
    }
}
