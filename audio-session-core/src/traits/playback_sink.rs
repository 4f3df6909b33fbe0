use std::sync::Arc;

use crate::models::error::AudioError;
use crate::player::completion::CompletionGuard;
use crate::player::cursor::PlaybackCursor;

/// Platform-specific output device for playback.
///
/// Implemented by `WasapiPlayback` (Windows) and `CoreAudioPlayback`
/// (macOS). The sink pulls frames from the cursor on its own render
/// thread and resolves `completion` with `Completed` once the cursor is
/// exhausted **and** the device has consumed its buffered frames —
/// detected through the device's playback-position/padding mechanism,
/// never a fixed sleep.
///
/// The sink must not resolve the guard on `stop()`; the player owns the
/// `Stopped` outcome. `Failed` is the sink's to resolve on unrecoverable
/// device errors.
pub trait PlaybackSink: Send + Sync {
    /// Whether an output device is currently available.
    fn is_available(&self) -> bool;

    /// Begin streaming from `cursor` to the active output device.
    /// Returns immediately; rendering happens on a dedicated thread.
    fn start(
        &mut self,
        cursor: PlaybackCursor,
        completion: Arc<CompletionGuard>,
    ) -> Result<(), AudioError>;

    /// Halt rendering and release the device. Idempotent; must be
    /// effective even when the device has already disappeared.
    fn stop(&mut self);
}
