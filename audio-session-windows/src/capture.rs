//! WASAPI microphone capture provider.
//!
//! Opens a capture endpoint in shared mode and delivers Float32 buffers
//! on a dedicated high-priority thread registered with MMCSS. The
//! endpoint is picked per `MicSource`: the default console endpoint, the
//! first non-Bluetooth endpoint, or the HFP endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_session_core::models::config::MicSource;
use audio_session_core::models::device::AudioDevice;
use audio_session_core::models::error::AudioError;
use audio_session_core::traits::capture_provider::{
    AudioBufferCallback, CaptureFatalCallback, CaptureProvider,
};

use crate::device_catalog::DeviceCatalog;

/// WASAPI capture endpoint provider.
pub struct WasapiCapture {
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

// SAFETY: All COM objects live on the capture thread; the struct fields
// are atomics or Mutex-protected.
unsafe impl Send for WasapiCapture {}
unsafe impl Sync for WasapiCapture {}

impl WasapiCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    /// Resolve the endpoint id for a source, on the caller's thread.
    fn resolve_endpoint(source: MicSource) -> Result<Option<String>, AudioError> {
        let catalog = DeviceCatalog::new()?;
        match source {
            MicSource::Default => Ok(None),
            MicSource::PhoneMic => catalog
                .built_in_input()?
                .map(|d| Some(d.id))
                .ok_or_else(|| AudioError::DeviceUnavailable("no wired microphone".into())),
            MicSource::HandsFreeMic => catalog
                .hands_free_input()?
                .map(|d| Some(d.id))
                .ok_or_else(|| {
                    AudioError::DeviceUnavailable("no hands-free link present".into())
                }),
        }
    }
}

impl Default for WasapiCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for WasapiCapture {
    fn is_available(&self, source: MicSource) -> bool {
        com_guarded(|| Self::resolve_endpoint(source).is_ok()).unwrap_or(false)
    }

    fn start(
        &mut self,
        source: MicSource,
        on_buffer: AudioBufferCallback,
        on_fatal: CaptureFatalCallback,
    ) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::SessionAlreadyActive);
        }

        // Fail fast on the caller's thread when the source cannot exist.
        let device_id = com_guarded(|| Self::resolve_endpoint(source))??;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        let handle = thread::Builder::new()
            .name("wasapi-capture".into())
            .spawn(move || {
                if let Err(err) = capture_loop(running.clone(), device_id, on_buffer) {
                    log::error!("capture loop ended with error: {}", err);
                    on_fatal(err);
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| AudioError::Io(format!("failed to spawn capture thread: {}", e)))?;

        *self.capture_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self, source: MicSource) -> Option<AudioDevice> {
        com_guarded(|| {
            let catalog = DeviceCatalog::new().ok()?;
            match source {
                MicSource::Default => {
                    let id = catalog.default_input_id().ok()?;
                    catalog.list_inputs().ok()?.into_iter().find(|d| d.id == id)
                }
                MicSource::PhoneMic => catalog.built_in_input().ok()?,
                MicSource::HandsFreeMic => catalog.hands_free_input().ok()?,
            }
        })
        .ok()
        .flatten()
    }
}

/// Run `f` with COM initialized on the current thread.
fn com_guarded<T>(f: impl FnOnce() -> T) -> Result<T, AudioError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| AudioError::DeviceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
    }
    let _guard = CoUninitializeGuard;
    Ok(f())
}

/// Main capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. CoInitializeEx (MTA)
/// 2. Get capture device (default or by id)
/// 3. Activate IAudioClient, initialize in shared mode
/// 4. Get IAudioCaptureClient service
/// 5. Register with MMCSS for real-time priority
/// 6. Start capture, poll for packets until stopped
///
/// Transient `GetBuffer` failures are logged and ridden out; a dead
/// device ends the loop with an error, which the provider reports as
/// fatal. Whatever was already delivered stays captured.
fn capture_loop(
    running: Arc<AtomicBool>,
    device_id: Option<String>,
    on_buffer: AudioBufferCallback,
) -> Result<(), AudioError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| AudioError::DeviceUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        let _com_guard = CoUninitializeGuard;

        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|_| AudioError::DeviceUnavailable("no device enumerator".into()))?;

        let device = if let Some(ref id) = device_id {
            let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
            enumerator
                .GetDevice(PCWSTR(wide_id.as_ptr()))
                .map_err(|_| AudioError::DeviceUnavailable(format!("endpoint gone: {}", id)))?
        } else {
            enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| AudioError::DeviceUnavailable("no default microphone".into()))?
        };

        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| AudioError::DeviceUnavailable(format!("Activate failed: {}", e)))?;

        let mix_format_ptr = audio_client
            .GetMixFormat()
            .map_err(|e| AudioError::DeviceUnavailable(format!("GetMixFormat failed: {}", e)))?;
        let mix_format = &*mix_format_ptr;
        let sample_rate = mix_format.nSamplesPerSec as f64;
        let channels = mix_format.nChannels;

        // 100ms buffer, in 100-nanosecond units.
        let buffer_duration = 1_000_000;
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                buffer_duration,
                0,
                mix_format,
                None,
            )
            .map_err(|e| {
                AudioError::DeviceUnavailable(format!("IAudioClient::Initialize failed: {}", e))
            })?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| AudioError::DeviceUnavailable(format!("GetService failed: {}", e)))?;

        // Real-time priority via MMCSS.
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let _mmcss_handle = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);

        audio_client
            .Start()
            .map_err(|e| AudioError::DeviceUnavailable(format!("IAudioClient::Start failed: {}", e)))?;

        while running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));

            let mut packet_length: u32 = 0;
            capture_client
                .GetNextPacketSize(&mut packet_length)
                .map_err(|e| {
                    AudioError::DeviceUnavailable(format!("GetNextPacketSize failed: {}", e))
                })?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                if let Err(e) =
                    capture_client.GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                {
                    // Transient read error: log and keep the loop alive.
                    log::warn!("GetBuffer failed, skipping packet: {}", e);
                    break;
                }

                if num_frames > 0 && !buffer_ptr.is_null() {
                    let total_samples = num_frames as usize * channels as usize;

                    // WASAPI delivers Float32 in shared mode.
                    let samples =
                        std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);

                    if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                        let silence = vec![0.0f32; total_samples];
                        on_buffer(&silence, sample_rate, channels);
                    } else {
                        on_buffer(samples, sample_rate, channels);
                    }
                }

                capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| AudioError::DeviceUnavailable(format!("ReleaseBuffer failed: {}", e)))?;

                capture_client
                    .GetNextPacketSize(&mut packet_length)
                    .map_err(|e| {
                        AudioError::DeviceUnavailable(format!("GetNextPacketSize failed: {}", e))
                    })?;
            }
        }

        let _ = audio_client.Stop();
        CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
    }

    Ok(())
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
