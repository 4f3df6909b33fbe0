pub mod coordinator;

pub use coordinator::{
    PlaybackOptions, PlaybackTicket, SessionCoordinator, DEFAULT_PLAYBACK_WATCHDOG,
};
