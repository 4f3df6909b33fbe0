//! Bluetooth hands-free (HFP) control on Windows.
//!
//! Windows engages SCO implicitly when an application opens an HFP
//! capture endpoint, so `engage()` validates that such an endpoint is
//! present and records the link state; the capture provider's
//! `MicSource::HandsFreeMic` path then opens it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use windows::Win32::System::Com::*;

use audio_session_core::models::error::AudioError;
use audio_session_core::traits::hands_free::HandsFreeControl;

use crate::device_catalog::DeviceCatalog;

pub struct WindowsHandsFree {
    engaged: Arc<AtomicBool>,
}

impl WindowsHandsFree {
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
        unsafe {
            if CoInitializeEx(None, COINIT_MULTITHREADED).ok().is_err() {
                return false;
            }
        }
        let _guard = ComGuard;
        DeviceCatalog::new()
            .and_then(|c| c.hands_free_input())
            .map(|d| d.is_some())
            .unwrap_or(false)
    }
}

impl Default for WindowsHandsFree {
    fn default() -> Self {
        Self::new()
    }
}

impl HandsFreeControl for WindowsHandsFree {
    fn is_available(&self) -> bool {
        Self::hands_free_present()
    }

    fn engage(&mut self) -> Result<(), AudioError> {
        if !Self::hands_free_present() {
            return Err(AudioError::DeviceUnavailable(
                "no hands-free endpoint present".into(),
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

struct ComGuard;

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
