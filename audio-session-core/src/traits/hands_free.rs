use crate::models::error::AudioError;

/// Control over the Bluetooth voice (SCO) link.
///
/// The link is a singleton system resource; the `SessionCoordinator` is
/// its sole mutator so that independent call paths cannot fight over
/// engagement state.
pub trait HandsFreeControl: Send + Sync {
    /// Whether a hands-free capable device is currently present.
    fn is_available(&self) -> bool;

    /// Engage the voice link. Fails with `DeviceUnavailable` when no
    /// hands-free device is present.
    fn engage(&mut self) -> Result<(), AudioError>;

    /// Release the voice link and restore the default audio mode.
    /// Best-effort; safe to call when not engaged.
    fn release(&mut self);

    fn is_engaged(&self) -> bool;
}
