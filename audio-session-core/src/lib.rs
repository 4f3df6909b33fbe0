//! # audio-session-core
//!
//! Platform-agnostic core of the Bluetooth-aware audio I/O subsystem.
//!
//! Provides route observation, WAV container I/O, microphone capture,
//! playback, and session arbitration. Platform backends (Windows WASAPI,
//! macOS CoreAudio host) implement the provider traits and plug into the
//! generic engines.
//!
//! ## Architecture
//!
//! ```text
//! audio-session-core (this crate)
//! ├── traits/       ← CaptureProvider, PlaybackSink, RouteProvider,
//! │                   HandsFreeControl, SessionDelegate
//! ├── models/       ← AudioError, RouteSnapshot, RecordConfig,
//! │                   RecordingResult, PlaybackOutcome, session phases
//! ├── wav/          ← canonical header writer, chunk-walking reader
//! ├── processing/   ← ring buffer, PCM math
//! ├── route/        ← RouteMonitor, classification heuristics
//! ├── recorder/     ← capture engine
//! ├── player/       ← playback engine, cursor, completion guard
//! ├── session/      ← SessionCoordinator, watchdog, auto-stop
//! └── storage/      ← metadata sidecar
//! ```

pub mod models;
pub mod player;
pub mod processing;
pub mod recorder;
pub mod route;
pub mod session;
pub mod storage;
pub mod traits;
pub mod wav;

// Re-export key types at crate root for convenience.
pub use models::config::{MicSource, RecordConfig};
pub use models::device::{AudioDevice, DeviceKind, RouteSnapshot};
pub use models::error::AudioError;
pub use models::result::{RecordingMetadata, RecordingResult};
pub use models::state::{PlaybackOutcome, PlayerPhase, RecorderPhase};
pub use player::{CompletionGuard, Player, PlaybackCursor};
pub use processing::ring_buffer::RingBuffer;
pub use recorder::Recorder;
pub use route::{RouteCallback, RouteMonitor};
pub use session::{PlaybackOptions, PlaybackTicket, SessionCoordinator};
pub use traits::capture_provider::{AudioBufferCallback, CaptureFatalCallback, CaptureProvider};
pub use traits::hands_free::HandsFreeControl;
pub use traits::playback_sink::PlaybackSink;
pub use traits::route_provider::{RouteChangeCallback, RouteProvider};
pub use traits::session_delegate::SessionDelegate;
pub use wav::{PcmSpec, WavInfo};
