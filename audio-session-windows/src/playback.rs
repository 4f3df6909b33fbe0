//! WASAPI playback sink.
//!
//! Opens the default render endpoint in shared mode and feeds it from
//! the playback cursor on a dedicated thread. Completion is detected
//! through the device's own padding counter: once the cursor is
//! exhausted, the loop waits for `GetCurrentPadding` to reach zero
//! before resolving, so the session never completes before the audio has
//! truly left the buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_session_core::models::error::AudioError;
use audio_session_core::models::state::PlaybackOutcome;
use audio_session_core::player::{CompletionGuard, PlaybackCursor};
use audio_session_core::processing::pcm;
use audio_session_core::traits::playback_sink::PlaybackSink;

use crate::device_catalog::DeviceCatalog;

/// How much of the cursor to pull and resample per refill.
const CURSOR_CHUNK: usize = 2_048;

/// WASAPI render endpoint sink.
pub struct WasapiPlayback {
    running: Arc<AtomicBool>,
    render_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

// SAFETY: All COM objects live on the render thread; the struct fields
// are atomics or Mutex-protected.
unsafe impl Send for WasapiPlayback {}
unsafe impl Sync for WasapiPlayback {}

impl WasapiPlayback {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            render_handle: Mutex::new(None),
        }
    }
}

impl Default for WasapiPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for WasapiPlayback {
    fn is_available(&self) -> bool {
        unsafe {
            if CoInitializeEx(None, COINIT_MULTITHREADED).ok().is_err() {
                return false;
            }
        }
        let _guard = CoUninitializeGuard;
        DeviceCatalog::new()
            .and_then(|c| c.default_output_id())
            .is_ok()
    }

    fn start(
        &mut self,
        cursor: PlaybackCursor,
        completion: Arc<CompletionGuard>,
    ) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::SessionAlreadyActive);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("wasapi-render".into())
            .spawn(move || {
                match render_loop(running.clone(), cursor) {
                    Ok(finished_naturally) => {
                        if finished_naturally {
                            completion.resolve(PlaybackOutcome::Completed);
                        }
                        // Interrupted by stop(): the player resolves.
                    }
                    Err(err) => {
                        log::error!("render loop ended with error: {}", err);
                        completion.resolve(PlaybackOutcome::Failed(err));
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| AudioError::Io(format!("failed to spawn render thread: {}", e)));

        match handle {
            Ok(handle) => {
                *self.render_handle.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Render loop on a dedicated thread.
///
/// Returns `Ok(true)` when the source played to the end, `Ok(false)`
/// when interrupted by `stop()`.
fn render_loop(running: Arc<AtomicBool>, cursor: PlaybackCursor) -> Result<bool, AudioError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| AudioError::DeviceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        let _com_guard = CoUninitializeGuard;

        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|_| AudioError::DeviceUnavailable("no device enumerator".into()))?;

        let device = enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|_| AudioError::DeviceUnavailable("no default output device".into()))?;

        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| AudioError::DeviceUnavailable(format!("Activate failed: {}", e)))?;

        let mix_format_ptr = audio_client
            .GetMixFormat()
            .map_err(|e| AudioError::DeviceUnavailable(format!("GetMixFormat failed: {}", e)))?;
        let mix_format = &*mix_format_ptr;
        let device_rate = mix_format.nSamplesPerSec as f64;
        let device_channels = mix_format.nChannels as usize;

        let buffer_duration = 1_000_000; // 100ms in 100ns units
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                0,
                buffer_duration,
                0,
                mix_format,
                None,
            )
            .map_err(|e| {
                AudioError::DeviceUnavailable(format!("IAudioClient::Initialize failed: {}", e))
            })?;

        let render_client: IAudioRenderClient = audio_client
            .GetService()
            .map_err(|e| AudioError::DeviceUnavailable(format!("GetService failed: {}", e)))?;

        let buffer_frames = audio_client
            .GetBufferSize()
            .map_err(|e| AudioError::DeviceUnavailable(format!("GetBufferSize failed: {}", e)))?;

        audio_client
            .Start()
            .map_err(|e| AudioError::DeviceUnavailable(format!("IAudioClient::Start failed: {}", e)))?;

        let spec = cursor.spec();
        let source_rate = spec.sample_rate as f64;
        let source_channels = spec.channels as usize;

        // Mono staging buffer at the device rate, refilled from the
        // cursor in chunks.
        let mut staging: Vec<f32> = Vec::new();
        let mut exhausted = false;

        loop {
            if !running.load(Ordering::SeqCst) {
                let _ = audio_client.Stop();
                CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
                return Ok(false);
            }

            let padding = audio_client
                .GetCurrentPadding()
                .map_err(|e| AudioError::DeviceUnavailable(format!("GetCurrentPadding failed: {}", e)))?;

            if exhausted && staging.is_empty() {
                // Source fully handed off: wait for the device to drain.
                if padding == 0 {
                    let _ = audio_client.Stop();
                    CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
                    return Ok(true);
                }
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            let writable = (buffer_frames - padding) as usize;
            if writable == 0 {
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            while !exhausted && staging.len() < writable {
                match cursor.take(CURSOR_CHUNK) {
                    Some(chunk) => {
                        let mono = pcm::downmix_to_mono(&chunk, source_channels);
                        staging.extend(pcm::resample(&mono, source_rate, device_rate));
                    }
                    None => exhausted = true,
                }
            }

            let frames = writable.min(staging.len());
            if frames == 0 {
                thread::sleep(Duration::from_millis(5));
                continue;
            }

            let buffer_ptr = render_client
                .GetBuffer(frames as u32)
                .map_err(|e| AudioError::DeviceUnavailable(format!("GetBuffer failed: {}", e)))?;

            // Shared mode renders Float32; duplicate mono across the
            // device's channels.
            let out = std::slice::from_raw_parts_mut(
                buffer_ptr as *mut f32,
                frames * device_channels,
            );
            for (frame, &sample) in staging[..frames].iter().enumerate() {
                for ch in 0..device_channels {
                    out[frame * device_channels + ch] = sample;
                }
            }
            staging.drain(..frames);

            render_client
                .ReleaseBuffer(frames as u32, 0)
                .map_err(|e| AudioError::DeviceUnavailable(format!("ReleaseBuffer failed: {}", e)))?;
        }
    }
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
