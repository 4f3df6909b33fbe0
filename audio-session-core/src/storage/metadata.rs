use std::fs;
use std::path::Path;

use crate::models::error::AudioError;
use crate::models::result::RecordingMetadata;

/// Write recording metadata as a JSON sidecar file.
///
/// Creates `{recording}.metadata.json` alongside the recording.
pub fn write_sidecar(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), AudioError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| AudioError::Io(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&sidecar_path, json).map_err(AudioError::io)?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_sidecar(recording_path: &Path) -> Result<RecordingMetadata, AudioError> {
    let sidecar_path = recording_path.with_extension("metadata.json");
    let json = fs::read_to_string(&sidecar_path).map_err(AudioError::io)?;
    serde_json::from_str(&json)
        .map_err(|e| AudioError::Io(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_round_trip() {
        let recording = std::env::temp_dir().join("audio_session_sidecar_test.wav");
        let metadata = RecordingMetadata::new(2.0, "test.wav", 64_044, 16_000, 1, 16, "abc123");

        write_sidecar(&metadata, &recording).unwrap();
        let loaded = read_sidecar(&recording).unwrap();
        assert_eq!(loaded, metadata);

        std::fs::remove_file(recording.with_extension("metadata.json")).ok();
    }
}
