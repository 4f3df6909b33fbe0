use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::models::state::PlaybackOutcome;

/// Callback observing the end of one playback session.
pub type CompletionCallback = Box<dyn FnOnce(PlaybackOutcome) + Send + 'static>;

/// Single-fire resolver bridging native completion into the caller's
/// callback.
///
/// Natural completion (sink), explicit stop (player), and the watchdog
/// (coordinator) all race to resolve; the flag guarantees the callback
/// runs exactly once, with the first outcome to arrive.
pub struct CompletionGuard {
    fired: AtomicBool,
    callback: Mutex<Option<CompletionCallback>>,
}

impl std::fmt::Debug for CompletionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("fired", &self.fired.load(Ordering::SeqCst))
            .finish()
    }
}

impl CompletionGuard {
    pub fn new(callback: CompletionCallback) -> Self {
        Self {
            fired: AtomicBool::new(false),
            callback: Mutex::new(Some(callback)),
        }
    }

    /// Resolve with `outcome`. Returns true if this call won the race;
    /// later calls are no-ops.
    pub fn resolve(&self, outcome: PlaybackOutcome) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(callback) = self.callback.lock().take() {
            callback(outcome);
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
