//! Route observation on Windows.
//!
//! Snapshots come straight from the MMDevice catalog. Change watching
//! runs a poll thread that diffs successive snapshots and pings the
//! monitor's callback when anything moved; the monitor's own
//! value-compare then guarantees one delivery per physical change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::Win32::System::Com::*;

use audio_session_core::models::device::RouteSnapshot;
use audio_session_core::models::error::AudioError;
use audio_session_core::traits::route_provider::{RouteChangeCallback, RouteProvider};

use crate::device_catalog::DeviceCatalog;

/// Poll cadence for the watcher thread.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Windows route provider over the MMDevice catalog.
pub struct WindowsRouteProvider {
    engaged: Arc<AtomicBool>,
    watching: Arc<AtomicBool>,
    watch_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WindowsRouteProvider {
    pub fn new() -> Self {
        Self {
            engaged: Arc::new(AtomicBool::new(false)),
            watching: Arc::new(AtomicBool::new(false)),
            watch_handle: Mutex::new(None),
        }
    }

    /// Shared flag the hands-free control flips when the voice link is
    /// engaged, so snapshots report `hands_free_link_active` truthfully.
    pub fn engaged_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.engaged)
    }
}

impl Default for WindowsRouteProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteProvider for WindowsRouteProvider {
    fn snapshot(&self) -> Result<RouteSnapshot, AudioError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| AudioError::DeviceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        }
        let _guard = ComGuard;
        DeviceCatalog::new()?.snapshot(self.engaged.load(Ordering::SeqCst))
    }

    fn subscribe(&mut self, on_event: RouteChangeCallback) -> Result<(), AudioError> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let watching = Arc::clone(&self.watching);
        let engaged = Arc::clone(&self.engaged);

        let handle = thread::Builder::new()
            .name("route-watch".into())
            .spawn(move || {
                unsafe {
                    if CoInitializeEx(None, COINIT_MULTITHREADED).ok().is_err() {
                        log::error!("route watcher could not initialize COM");
                        return;
                    }
                }
                let _guard = ComGuard;

                let mut previous: Option<RouteSnapshot> = None;
                while watching.load(Ordering::SeqCst) {
                    thread::sleep(WATCH_INTERVAL);

                    let snapshot = DeviceCatalog::new()
                        .and_then(|c| c.snapshot(engaged.load(Ordering::SeqCst)));
                    let snapshot = match snapshot {
                        Ok(s) => s,
                        Err(err) => {
                            log::warn!("route poll failed: {}", err);
                            continue;
                        }
                    };

                    let moved = previous
                        .as_ref()
                        .map_or(true, |prev| !prev.same_route(&snapshot));
                    if moved {
                        previous = Some(snapshot);
                        on_event();
                    }
                }
            })
            .map_err(|e| AudioError::Io(format!("failed to spawn route watcher: {}", e)));

        match handle {
            Ok(handle) => {
                *self.watch_handle.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.watching.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn unsubscribe(&mut self) {
        self.watching.store(false, Ordering::SeqCst);
        if let Some(handle) = self.watch_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

struct ComGuard;

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
