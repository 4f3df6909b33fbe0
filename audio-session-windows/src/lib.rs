//! # audio-session-windows
//!
//! Windows WASAPI backend for audio-session-kit.
//!
//! Provides:
//! - `DeviceCatalog` — MMDevice enumeration with portable `DeviceKind`
//!   classification and Bluetooth HFP detection
//! - `WasapiCapture` — microphone capture via a WASAPI capture endpoint
//! - `WasapiPlayback` — playback via a WASAPI render endpoint with
//!   padding-based completion detection
//! - `WindowsRouteProvider` — route snapshots and change watching
//! - `WindowsHandsFree` — HFP endpoint availability and selection
//!
//! ## Platform Requirements
//! - Windows 10 1703+ (build 15063)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_session_core::SessionCoordinator;
//! use audio_session_windows::{
//!     DeviceCatalog, WasapiCapture, WasapiPlayback, WindowsHandsFree, WindowsRouteProvider,
//! };
//!
//! let coordinator = SessionCoordinator::new(
//!     WasapiCapture::new(),
//!     WasapiPlayback::new(),
//!     WindowsHandsFree::new(),
//!     WindowsRouteProvider::new(),
//! );
//! ```

#[cfg(target_os = "windows")]
pub mod capture;
#[cfg(target_os = "windows")]
pub mod device_catalog;
#[cfg(target_os = "windows")]
pub mod hands_free;
#[cfg(target_os = "windows")]
pub mod playback;
#[cfg(target_os = "windows")]
pub mod routes;

#[cfg(target_os = "windows")]
pub use capture::WasapiCapture;
#[cfg(target_os = "windows")]
pub use device_catalog::DeviceCatalog;
#[cfg(target_os = "windows")]
pub use hands_free::WindowsHandsFree;
#[cfg(target_os = "windows")]
pub use playback::WasapiPlayback;
#[cfg(target_os = "windows")]
pub use routes::WindowsRouteProvider;
