//! Debounced rebuild scheduling.
//!
//! ```text
//! Idle --event--> PendingRebuild --quiet for `delay`--> Rebuilding --> Idle
//!                   ^        |
//!                   +-event--+  (countdown restarts)
//! ```
//!
//! Event delivery is suspended while rebuilding, so changes made during a
//! scan are only picked up once some later change arrives. There is no
//! periodic re-scan to close that gap.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use super::events::WatcherEvent;

/// Debounce state machine state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum DebounceState {
    Idle = 0,
    PendingRebuild = 1,
    Rebuilding = 2,
}

impl DebounceState {
    /// Loads the state from an atomic.
    pub fn load(atomic: &AtomicU8) -> Self {
        match atomic.load(Ordering::SeqCst) {
            1 => Self::PendingRebuild,
            2 => Self::Rebuilding,
            _ => Self::Idle,
        }
    }

    fn store(self, atomic: &AtomicU8) {
        atomic.store(self as u8, Ordering::SeqCst);
    }

    /// Returns the state as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PendingRebuild => "pending",
            Self::Rebuilding => "rebuilding",
        }
    }
}

/// Runs the debounce loop until `Shutdown` arrives or every sender is gone.
///
/// `rebuild` runs on the calling thread with `suspended` set.
pub fn run_debounce_loop<F>(
    delay: Duration,
    events: &Receiver<WatcherEvent>,
    state: &AtomicU8,
    suspended: &AtomicBool,
    mut rebuild: F,
) where
    F: FnMut(),
{
    loop {
        DebounceState::Idle.store(state);

        match events.recv() {
            Ok(WatcherEvent::Shutdown) | Err(_) => return,
            Ok(WatcherEvent::Error(message)) => {
                log::warn!("package watcher error: {message}");
                continue;
            }
            Ok(event) => log_change(&event),
        }

        DebounceState::PendingRebuild.store(state);
        log::debug!("package rebuild in {}ms", delay.as_millis());
        let mut deadline = Instant::now() + delay;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(WatcherEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
                Ok(WatcherEvent::Error(message)) => {
                    log::warn!("package watcher error: {message}");
                }
                Ok(event) => {
                    log_change(&event);
                    log::debug!("restarting package rebuild countdown");
                    deadline = Instant::now() + delay;
                }
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        DebounceState::Rebuilding.store(state);
        suspended.store(true, Ordering::SeqCst);
        rebuild();

        // Whatever queued up before suspension took effect is covered by
        // the scan that just ran.
        let mut shutdown = false;
        loop {
            match events.try_recv() {
                Ok(WatcherEvent::Shutdown) | Err(TryRecvError::Disconnected) => {
                    shutdown = true;
                    break;
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
            }
        }
        suspended.store(false, Ordering::SeqCst);

        if shutdown {
            DebounceState::Idle.store(state);
            return;
        }
    }
}

fn log_change(event: &WatcherEvent) {
    match event {
        WatcherEvent::ArchivesChanged(paths) => {
            for path in paths {
                log::debug!("package change detected path={}", path.display());
            }
        }
        WatcherEvent::RescanRequired => log::debug!("package rescan requested"),
        WatcherEvent::Error(_) | WatcherEvent::Shutdown => {}
    }
}
