//! Device enumeration and route observation on macOS.
//!
//! cpal's CoreAudio host exposes display names but no transport
//! property, so classification leans on the shared name heuristics. A
//! poll thread diffs successive snapshots for change watching; the core
//! monitor's value-compare turns that into one callback per physical
//! change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;

use audio_session_core::models::device::{AudioDevice, RouteSnapshot};
use audio_session_core::models::error::AudioError;
use audio_session_core::route::classify;
use audio_session_core::traits::route_provider::{RouteChangeCallback, RouteProvider};

/// Poll cadence for the watcher thread.
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// List current input devices as portable snapshot values.
pub fn list_inputs() -> Result<Vec<AudioDevice>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceUnavailable(format!("input enumeration failed: {}", e)))?;
    Ok(collect(devices, true))
}

/// List current output devices as portable snapshot values.
pub fn list_outputs() -> Result<Vec<AudioDevice>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceUnavailable(format!("output enumeration failed: {}", e)))?;
    Ok(collect(devices, false))
}

fn collect(devices: impl Iterator<Item = cpal::Device>, is_input: bool) -> Vec<AudioDevice> {
    devices
        .enumerate()
        .map(|(index, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Device {}", index));
            let kind = classify::classify_name(&name, is_input);
            AudioDevice {
                // cpal exposes no stable id on CoreAudio; the name is
                // the best handle available.
                id: name.clone(),
                kind,
                display_name: name,
                address: None,
                native_kind: None,
            }
        })
        .collect()
}

/// Build a route snapshot from the current device lists.
pub fn snapshot(hands_free_engaged: bool) -> Result<RouteSnapshot, AudioError> {
    let inputs = list_inputs()?;
    let outputs = list_outputs()?;
    Ok(RouteSnapshot::new(inputs, outputs, hands_free_engaged))
}

/// macOS route provider.
pub struct MacRouteProvider {
    engaged: Arc<AtomicBool>,
    watching: Arc<AtomicBool>,
    watch_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl MacRouteProvider {
    pub fn new() -> Self {
        Self {
            engaged: Arc::new(AtomicBool::new(false)),
            watching: Arc::new(AtomicBool::new(false)),
            watch_handle: Mutex::new(None),
        }
    }

    /// Shared flag flipped by the hands-free control so snapshots report
    /// `hands_free_link_active` truthfully.
    pub fn engaged_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.engaged)
    }
}

impl Default for MacRouteProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteProvider for MacRouteProvider {
    fn snapshot(&self) -> Result<RouteSnapshot, AudioError> {
        snapshot(self.engaged.load(Ordering::SeqCst))
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
                let mut previous: Option<RouteSnapshot> = None;
                while watching.load(Ordering::SeqCst) {
                    thread::sleep(WATCH_INTERVAL);

                    let current = match snapshot(engaged.load(Ordering::SeqCst)) {
                        Ok(s) => s,
                        Err(err) => {
                            log::warn!("route poll failed: {}", err);
                            continue;
                        }
                    };

                    let moved = previous
                        .as_ref()
                        .map_or(true, |prev| !prev.same_route(&current));
                    if moved {
                        previous = Some(current);
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
