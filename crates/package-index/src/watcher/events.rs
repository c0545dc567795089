//! Filesystem watching via notify.
//!
//! Watcher callbacks send events through a crossbeam channel instead of
//! touching index state. The debounce thread is the sole consumer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{IndexError, Result};
use crate::indexer::{is_archive, is_symbols_archive};

/// An event sent from the watcher to the debounce thread.
#[derive(Debug)]
pub enum WatcherEvent {
    /// Archives (or directories that may hold them) changed.
    ArchivesChanged(Vec<PathBuf>),
    /// The watcher lost track of changes, or a rebuild was requested directly.
    RescanRequired,
    /// The watcher encountered an error.
    Error(String),
    /// Stop the debounce thread.
    Shutdown,
}

/// Creates a recursive watcher on `root`.
///
/// While `suspended` is set, events are dropped at the source.
pub fn create_index_watcher(
    root: &Path,
    suspended: Arc<AtomicBool>,
    event_tx: Sender<WatcherEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher =
        recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                if suspended.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(watcher_event) = classify_event(event) {
                    let _ = event_tx.send(watcher_event);
                }
            }
            Err(error) => {
                let _ = event_tx.send(WatcherEvent::Error(error.to_string()));
            }
        })
        .map_err(|error| {
            IndexError::Watch(format!(
                "failed to create filesystem watcher for {}: {error}",
                root.display()
            ))
        })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|error| {
            IndexError::Watch(format!("failed to watch {}: {error}", root.display()))
        })?;

    Ok(watcher)
}

/// Maps a notify event to a watcher event, or `None` if it cannot affect the index.
///
/// Reads and attribute-only changes are ignored: the index depends on paths,
/// and read-only marking would otherwise retrigger the rebuild that did it.
pub fn classify_event(event: Event) -> Option<WatcherEvent> {
    match event.kind {
        EventKind::Access(_) => return None,
        EventKind::Modify(ModifyKind::Metadata(_)) => return None,
        _ => {}
    }

    if event.need_rescan() || event.paths.is_empty() {
        return Some(WatcherEvent::RescanRequired);
    }

    let relevant: Vec<PathBuf> = event
        .paths
        .into_iter()
        .filter(|path| is_relevant_path(&event.kind, path))
        .collect();

    if relevant.is_empty() {
        None
    } else {
        Some(WatcherEvent::ArchivesChanged(relevant))
    }
}

fn is_relevant_path(kind: &EventKind, path: &Path) -> bool {
    if is_archive(path) {
        return !is_symbols_archive(path);
    }

    // Directories may carry archives in or out of the tree.
    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Remove(RemoveKind::Any) => {
            path.is_dir() || path.extension().is_none()
        }
        _ => false,
    }
}
