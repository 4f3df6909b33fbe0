//! # audio-session-macos
//!
//! macOS backend for audio-session-kit, over the CoreAudio host via
//! `cpal`.
//!
//! Provides:
//! - `CoreAudioCapture` — microphone capture through a cpal input stream
//! - `CoreAudioPlayback` — playback through a cpal output stream with
//!   presentation-timestamp completion detection
//! - `MacRouteProvider` — device enumeration and route watching
//! - `MacHandsFree` — hands-free availability from the Bluetooth input
//!   (macOS engages SCO implicitly when an HFP microphone is opened)
//!
//! ## Usage
//! ```ignore
//! use audio_session_core::SessionCoordinator;
//! use audio_session_macos::{CoreAudioCapture, CoreAudioPlayback, MacHandsFree, MacRouteProvider};
//!
//! let coordinator = SessionCoordinator::new(
//!     CoreAudioCapture::new(),
//!     CoreAudioPlayback::new(),
//!     MacHandsFree::new(),
//!     MacRouteProvider::new(),
//! );
//! ```

#[cfg(target_os = "macos")]
pub mod capture;
#[cfg(target_os = "macos")]
pub mod devices;
#[cfg(target_os = "macos")]
pub mod hands_free;
#[cfg(target_os = "macos")]
pub mod playback;

#[cfg(target_os = "macos")]
pub use capture::CoreAudioCapture;
#[cfg(target_os = "macos")]
pub use devices::MacRouteProvider;
#[cfg(target_os = "macos")]
pub use hands_free::MacHandsFree;
#[cfg(target_os = "macos")]
pub use playback::CoreAudioPlayback;
