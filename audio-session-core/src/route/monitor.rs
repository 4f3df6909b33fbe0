use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::RouteSnapshot;
use crate::models::error::AudioError;
use crate::traits::route_provider::{RouteChangeCallback, RouteProvider};

/// Callback observing normalized route changes.
pub type RouteCallback = Arc<dyn Fn(RouteSnapshot) + Send + Sync + 'static>;

/// Observes the platform route and delivers one callback per physical
/// change.
///
/// The provider's events can be noisy (several notifications for a single
/// plug event); the monitor recomputes a snapshot on every ping and
/// compares it by value against the previous one, so duplicates are
/// dropped while the final state is never lost.
pub struct RouteMonitor<R: RouteProvider> {
    provider: Arc<Mutex<R>>,
    watching: Arc<AtomicBool>,
    last_seen: Arc<Mutex<Option<RouteSnapshot>>>,
}

impl<R: RouteProvider + 'static> RouteMonitor<R> {
    pub fn new(provider: R) -> Self {
        Self {
            provider: Arc::new(Mutex::new(provider)),
            watching: Arc::new(AtomicBool::new(false)),
            last_seen: Arc::new(Mutex::new(None)),
        }
    }

    /// Synchronous, side-effect-free query of the current route.
    pub fn current_route(&self) -> Result<RouteSnapshot, AudioError> {
        self.provider.lock().snapshot()
    }

    /// Subscribe to route changes. Idempotent: a second call while
    /// already watching is a no-op and does not double-register.
    pub fn start_watching(&self, on_change: RouteCallback) -> Result<(), AudioError> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Seed the comparison state so the first event reports a real
        // transition, not the initial discovery.
        *self.last_seen.lock() = self.provider.lock().snapshot().ok();

        let provider = Arc::clone(&self.provider);
        let last_seen = Arc::clone(&self.last_seen);
        let watching = Arc::clone(&self.watching);

        let on_event: RouteChangeCallback = Arc::new(move || {
            if !watching.load(Ordering::SeqCst) {
                return;
            }
            let snapshot = match provider.lock().snapshot() {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    log::warn!("route snapshot failed during change event: {}", err);
                    return;
                }
            };

            let mut last = last_seen.lock();
            let changed = last
                .as_ref()
                .map_or(true, |prev| !prev.same_route(&snapshot));
            if !changed {
                return;
            }
            *last = Some(snapshot.clone());
            drop(last);

            on_change(snapshot);
        });

        let result = self.provider.lock().subscribe(on_event);
        if result.is_err() {
            self.watching.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Unsubscribe from route changes. Safe to call when not watching.
    pub fn stop_watching(&self) {
        if !self.watching.swap(false, Ordering::SeqCst) {
            return;
        }
        self.provider.lock().unsubscribe();
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }
}
