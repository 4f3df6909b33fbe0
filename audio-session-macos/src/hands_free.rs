//! Hands-free (SCO) state on macOS.
//!
//! Desktop CoreAudio engages the Bluetooth voice link implicitly when an
//! application opens an HFP microphone, so `engage()` validates that one
//! is present and records the link state for route snapshots; the
//! capture provider's `MicSource::HandsFreeMic` path opens it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};

use audio_session_core::models::error::AudioError;
use audio_session_core::route::classify;
use audio_session_core::traits::hands_free::HandsFreeControl;

pub struct MacHandsFree {
    engaged: Arc<AtomicBool>,
}

impl MacHandsFree {
    pub fn new() -> Self {
        Self {
            engaged: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share the engagement flag with the route provider so snapshots
    /// reflect the link state.
    pub fn with_flag(engaged: Arc<AtomicBool>) -> Self {
        Self { engaged }
    }

    fn hands_free_present() -> bool {
        let host = cpal::default_host();
        let Ok(mut devices) = host.input_devices() else {
            return false;
        };
        devices.any(|device| {
            device
                .name()
                .map(|name| classify::is_bluetooth_name(&name))
                .unwrap_or(false)
        })
    }
}

impl Default for MacHandsFree {
    fn default() -> Self {
        Self::new()
    }
}

impl HandsFreeControl for MacHandsFree {
    fn is_available(&self) -> bool {
        Self::hands_free_present()
    }

    fn engage(&mut self) -> Result<(), AudioError> {
        if !Self::hands_free_present() {
            return Err(AudioError::DeviceUnavailable(
                "no hands-free device present".into(),
            ));
        }
        self.engaged.store(true, Ordering::SeqCst);
        log::debug!("hands-free link engaged");
        Ok(())
    }

    fn release(&mut self) {
        if self.engaged.swap(false, Ordering::SeqCst) {
            log::debug!("hands-free link released");
        }
    }

    fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }
}
