//! Shared package index state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::CacheStrategy;
use crate::content::ContentStore;
use crate::error::Result;
use crate::indexer::{build_generation, unix_now_secs, BuiltGeneration, PackageIndexSnapshot};

/// One published snapshot and the content store paired with it.
///
/// The two are only ever replaced together.
#[derive(Debug, Clone)]
pub struct Generation {
    /// 0 for the initial scan, incremented by every successful rebuild.
    pub number: u64,
    pub snapshot: Arc<PackageIndexSnapshot>,
    pub store: Arc<ContentStore>,
}

impl Generation {
    fn from_built(number: u64, built: BuiltGeneration) -> Self {
        Self {
            number,
            snapshot: Arc::new(built.snapshot),
            store: Arc::new(built.store),
        }
    }
}

/// State shared between the index handle, the debounce thread and the watcher.
#[derive(Debug)]
pub struct SharedPackageIndex {
    /// Packages root being indexed.
    pub root: PathBuf,
    /// Whether indexed archives are marked read-only after each scan.
    pub make_readonly: bool,
    /// Content strategy used for every generation.
    pub strategy: CacheStrategy,
    /// The published generation. Readers take it shared, rebuilds exclusive.
    pub current: RwLock<Generation>,
    /// Current `DebounceState`.
    pub debounce_state: AtomicU8,
    /// Set while a rebuild runs; the watcher drops events meanwhile.
    pub events_suspended: Arc<AtomicBool>,
    /// Successful rebuilds, the initial scan excluded.
    pub rebuild_count: AtomicU64,
    /// Unix timestamp of the last successful scan.
    pub last_rebuild_at: AtomicU64,
    /// Last rebuild error message.
    pub last_error: Mutex<Option<String>>,
}

impl SharedPackageIndex {
    /// Runs the initial scan. Failing here is fatal for the caller.
    pub fn open(root: PathBuf, strategy: CacheStrategy, make_readonly: bool) -> Result<Self> {
        let built = build_generation(&root, &strategy, make_readonly)?;
        Ok(Self {
            root,
            make_readonly,
            strategy,
            current: RwLock::new(Generation::from_built(0, built)),
            debounce_state: AtomicU8::new(0),
            events_suspended: Arc::new(AtomicBool::new(false)),
            rebuild_count: AtomicU64::new(0),
            last_rebuild_at: AtomicU64::new(unix_now_secs()),
            last_error: Mutex::new(None),
        })
    }

    /// Rescans the root and publishes the result.
    ///
    /// The exclusive lock is held for the whole scan, so readers arriving
    /// meanwhile wait for it to finish. On failure the previous generation
    /// stays published and the error is recorded.
    pub fn rebuild(&self) -> Result<()> {
        let mut current = self.current.write();
        log::info!("rebuilding package index root={}", self.root.display());

        match build_generation(&self.root, &self.strategy, self.make_readonly) {
            Ok(built) => {
                *current = Generation::from_built(current.number + 1, built);
                drop(current);

                self.rebuild_count.fetch_add(1, Ordering::Relaxed);
                self.last_rebuild_at.store(unix_now_secs(), Ordering::Relaxed);
                *self.last_error.lock() = None;
                Ok(())
            }
            Err(error) => {
                drop(current);
                log::warn!(
                    "package index rebuild failed, keeping previous snapshot root={} error={}",
                    self.root.display(),
                    error
                );
                *self.last_error.lock() = Some(error.to_string());
                Err(error)
            }
        }
    }
}
