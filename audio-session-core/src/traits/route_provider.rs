use std::sync::Arc;

use crate::models::device::RouteSnapshot;
use crate::models::error::AudioError;

/// Notification that something about the device topology changed. The
/// monitor recomputes a full snapshot on every ping, so providers may
/// deliver coarse events (device list changed) without further detail.
pub type RouteChangeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Platform-specific route observation.
///
/// `snapshot()` is a bounded synchronous query of the native device list
/// and hands-free state. `subscribe()` hooks the platform's
/// device-added/removed and hands-free-changed notifications; events must
/// be delivered in the order the OS raises them, from a notification or
/// watcher thread — never synchronously from inside `subscribe()` itself
/// (the monitor queries a fresh snapshot while handling each event).
pub trait RouteProvider: Send + Sync {
    fn snapshot(&self) -> Result<RouteSnapshot, AudioError>;

    fn subscribe(&mut self, on_event: RouteChangeCallback) -> Result<(), AudioError>;

    /// Safe to call when not subscribed.
    fn unsubscribe(&mut self);
}
