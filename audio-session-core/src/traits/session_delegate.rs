use crate::models::error::AudioError;
use crate::models::result::RecordingResult;
use crate::models::state::RecorderPhase;

/// Event delegate for recorder notifications.
///
/// All methods are called from capture or drain threads, not the caller's
/// thread. Implementations should marshal to their own executor if
/// needed.
pub trait SessionDelegate: Send + Sync {
    /// Called when the recorder changes phase.
    fn on_phase_changed(&self, phase: RecorderPhase);

    /// Called when a recoverable error was logged during an active loop.
    fn on_error(&self, error: &AudioError);

    /// Called when a capture completes and the file is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
