use std::sync::Arc;

use crate::models::config::MicSource;
use crate::models::device::AudioDevice;
use crate::models::error::AudioError;

/// Callback invoked when a capture buffer is available.
///
/// Parameters:
/// - `samples`: interleaved f32 samples as delivered by the device.
/// - `sample_rate`: the actual rate of the delivered audio (Bluetooth
///   HFP links often negotiate 8 or 16 kHz regardless of what was asked).
/// - `channels`: 1 = mono, 2 = stereo interleaved.
pub type AudioBufferCallback = Arc<dyn Fn(&[f32], f64, u16) + Send + Sync + 'static>;

/// Callback invoked when the device is torn down mid-capture and the
/// native loop cannot continue. Fires at most once per `start()`.
pub type CaptureFatalCallback = Arc<dyn Fn(AudioError) + Send + Sync + 'static>;

/// Platform-specific microphone acquisition.
///
/// Implemented by `WasapiCapture` (Windows) and `CoreAudioCapture`
/// (macOS). The provider owns its device handle and capture thread; the
/// core never touches native APIs directly.
pub trait CaptureProvider: Send + Sync {
    /// Whether the given source can currently be opened.
    fn is_available(&self, source: MicSource) -> bool;

    /// Open the requested source and start delivering buffers.
    ///
    /// Fails with `DeviceUnavailable` when the source cannot be opened
    /// (e.g. `HandsFreeMic` with no hands-free link present). Buffers
    /// arrive on a dedicated capture thread; keep processing minimal.
    ///
    /// Transient read errors are the provider's to log and ride out;
    /// `on_fatal` is reserved for unrecoverable teardown.
    fn start(
        &mut self,
        source: MicSource,
        on_buffer: AudioBufferCallback,
        on_fatal: CaptureFatalCallback,
    ) -> Result<(), AudioError>;

    /// Stop capturing and release the device. Must be effective even if
    /// the device has already been physically disconnected.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// The endpoint this provider would open for `source`, if known.
    fn device_info(&self, source: MicSource) -> Option<AudioDevice>;
}
