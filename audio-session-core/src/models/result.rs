use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Result of a completed (or defensively stopped) capture session.
///
/// Immutable once constructed. `duration_secs` is derived from the byte
/// count when any audio was captured, falling back to wall-clock elapsed
/// time for an empty capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub metadata: RecordingMetadata,
}

impl RecordingResult {
    /// The zero result returned by a defensive `stop()` with no session.
    pub fn empty() -> Self {
        Self {
            file_path: PathBuf::new(),
            duration_secs: 0.0,
            size_bytes: 0,
            metadata: RecordingMetadata::default(),
        }
    }
}

/// Metadata stored alongside a recording as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub size_bytes: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub checksum: String,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        size_bytes: u64,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
        checksum: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            size_bytes,
            sample_rate,
            channels,
            bits_per_sample,
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
