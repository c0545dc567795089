//! Filesystem watching module.
//!
//! This module keeps the index fresh:
//! - notify integration, filtered to changes that can affect the index
//! - A debounce loop that coalesces bursts into one rebuild

mod debounce;
mod events;

pub use debounce::{run_debounce_loop, DebounceState};
pub use events::{classify_event, create_index_watcher, WatcherEvent};
