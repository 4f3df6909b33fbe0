use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::AudioError;

use super::PcmSpec;

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// Build the canonical 44-byte header for a PCM WAV file.
///
/// Layout (all little-endian):
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM fmt chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample rate
/// [28-31]  byte rate
/// [32-33]  block align
/// [34-35]  bits per sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn canonical_header(spec: PcmSpec, data_size: u32) -> [u8; WAV_HEADER_LEN] {
    let mut header = [0u8; WAV_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&spec.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&spec.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&spec.bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Streaming WAV file writer.
///
/// Writes a provisional header with a zero data size before any audio,
/// so a crash mid-recording leaves a structurally valid, zero-length-data
/// file rather than a truncated stub. `finalize()` patches the RIFF and
/// data size fields in place.
pub struct WavFileWriter {
    path: PathBuf,
    spec: PcmSpec,
    file: Option<File>,
    data_bytes: u64,
}

impl WavFileWriter {
    /// Create the destination file and write the provisional header.
    pub fn create(path: &Path, spec: PcmSpec) -> Result<Self, AudioError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(AudioError::io)?;
            }
        }

        let mut file = File::create(path).map_err(AudioError::io)?;
        let header = canonical_header(spec, 0);
        file.write_all(&header).map_err(AudioError::io)?;

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            file: Some(file),
            data_bytes: 0,
        })
    }

    /// Append raw PCM bytes in order.
    pub fn append(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AudioError::Io("writer already finalized".into()))?;
        file.write_all(pcm).map_err(AudioError::io)?;
        self.data_bytes += pcm.len() as u64;
        Ok(())
    }

    /// PCM bytes appended so far (header excluded).
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn spec(&self) -> PcmSpec {
        self.spec
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Patch the header size fields, flush, and close the file.
    ///
    /// Returns `(data_bytes, total_file_bytes, sha256_hex)`.
    pub fn finalize(mut self) -> Result<(u64, u64, String), AudioError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| AudioError::Io("writer already finalized".into()))?;

        let total = self.data_bytes + WAV_HEADER_LEN as u64;

        file.seek(SeekFrom::Start(4)).map_err(AudioError::io)?;
        file.write_all(&((total - 8) as u32).to_le_bytes())
            .map_err(AudioError::io)?;

        file.seek(SeekFrom::Start(40)).map_err(AudioError::io)?;
        file.write_all(&(self.data_bytes as u32).to_le_bytes())
            .map_err(AudioError::io)?;

        file.flush().map_err(AudioError::io)?;
        drop(file);

        let checksum = sha256_file(&self.path)?;
        Ok((self.data_bytes, total, checksum))
    }
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, AudioError> {
    let data = fs::read(path).map_err(AudioError::io)?;
    let digest = Sha256::digest(&data);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice_spec() -> PcmSpec {
        PcmSpec {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_session_writer_{}", name))
    }

    #[test]
    fn header_layout() {
        let header = canonical_header(voice_spec(), 0);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
        // PCM format code and fmt chunk size
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        assert_eq!(
            u32::from_le_bytes([header[16], header[17], header[18], header[19]]),
            16
        );
    }

    #[test]
    fn header_derived_fields() {
        let spec = PcmSpec {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        };
        let header = canonical_header(spec, 320);
        assert_eq!(
            u32::from_le_bytes([header[24], header[25], header[26], header[27]]),
            16_000
        );
        // byte rate = 16000 * 1 * 2
        assert_eq!(
            u32::from_le_bytes([header[28], header[29], header[30], header[31]]),
            32_000
        );
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 2);
        assert_eq!(
            u32::from_le_bytes([header[40], header[41], header[42], header[43]]),
            320
        );
        assert_eq!(
            u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
            36 + 320
        );
    }

    #[test]
    fn provisional_file_is_structurally_valid() {
        let path = temp_path("provisional.wav");
        let writer = WavFileWriter::create(&path, voice_spec()).unwrap();
        drop(writer); // simulate a crash before finalize

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44);
        assert_eq!(&data[0..4], b"RIFF");
        // data size still zero
        assert_eq!(u32::from_le_bytes([data[40], data[41], data[42], data[43]]), 0);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn finalize_patches_sizes() {
        let path = temp_path("finalized.wav");
        let mut writer = WavFileWriter::create(&path, voice_spec()).unwrap();
        writer.append(&[0u8; 320]).unwrap();
        let (data_bytes, total, checksum) = writer.finalize().unwrap();

        assert_eq!(data_bytes, 320);
        assert_eq!(total, 364);
        assert_eq!(checksum.len(), 64);

        let data = fs::read(&path).unwrap();
        assert_eq!(
            u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            320 + 36
        );
        assert_eq!(
            u32::from_le_bytes([data[40], data[41], data[42], data[43]]),
            320
        );

        fs::remove_file(&path).ok();
    }
}
