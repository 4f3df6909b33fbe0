//! Chunk-driven WAV container parsing.
//!
//! Incoming files can come from arbitrary encoders, so nothing here
//! assumes the canonical 44-byte layout: the parser reads the RIFF
//! prologue and then walks `(id, size)` chunk headers, consuming `fmt `
//! and `data` and skipping everything else by its declared size. Chunk
//! bodies are padded to even byte boundaries and the walker advances past
//! the pad byte. Declared sizes are never trusted past the real end of
//! the file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::models::error::AudioError;

use super::PcmSpec;

/// Parsed container parameters for one WAV file.
///
/// Invariant: `data_offset + data_size` never exceeds the source length;
/// a declared size overrunning the file is clipped to the bytes actually
/// present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Byte offset of the first PCM sample.
    pub data_offset: u64,
    /// Usable PCM byte count, clamped to the source length.
    pub data_size: u64,
}

impl WavInfo {
    pub fn spec(&self) -> PcmSpec {
        PcmSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// Audio duration implied by the clamped data size.
    pub fn duration_secs(&self) -> f64 {
        self.data_size as f64 / self.spec().byte_rate() as f64
    }
}

/// Parse the container structure of a WAV file.
pub fn parse_file(path: &Path) -> Result<WavInfo, AudioError> {
    let mut file = File::open(path).map_err(AudioError::io)?;
    parse(&mut file)
}

/// Parse a WAV container from any seekable source.
pub fn parse<R: Read + Seek>(source: &mut R) -> Result<WavInfo, AudioError> {
    let source_len = source.seek(SeekFrom::End(0)).map_err(AudioError::io)?;
    source.seek(SeekFrom::Start(0)).map_err(AudioError::io)?;

    let mut prologue = [0u8; 12];
    source
        .read_exact(&mut prologue)
        .map_err(|_| AudioError::CorruptContainer("shorter than RIFF prologue".into()))?;

    if &prologue[0..4] != b"RIFF" {
        return Err(AudioError::CorruptContainer("missing RIFF magic".into()));
    }
    if &prologue[8..12] != b"WAVE" {
        return Err(AudioError::CorruptContainer("missing WAVE form type".into()));
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None; // format code, channels, rate, bits
    let mut pos = 12u64;

    loop {
        let mut chunk_header = [0u8; 8];
        if source.read_exact(&mut chunk_header).is_err() {
            // Ran off the end without seeing a data chunk.
            return Err(AudioError::CorruptContainer("no data chunk".into()));
        }
        pos += 8;

        let chunk_id = [chunk_header[0], chunk_header[1], chunk_header[2], chunk_header[3]];
        let declared = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as u64;

        match &chunk_id {
            b"fmt " => {
                if declared < 16 {
                    return Err(AudioError::CorruptContainer(format!(
                        "fmt chunk too short: {} bytes",
                        declared
                    )));
                }
                let mut body = [0u8; 16];
                source
                    .read_exact(&mut body)
                    .map_err(|_| AudioError::CorruptContainer("truncated fmt chunk".into()))?;
                pos += 16;

                let format_code = u16::from_le_bytes([body[0], body[1]]);
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                let bits_per_sample = u16::from_le_bytes([body[14], body[15]]);

                if format_code != 1 {
                    return Err(AudioError::UnsupportedFormat(format!(
                        "non-PCM format code {}",
                        format_code
                    )));
                }
                if !(1..=2).contains(&channels) {
                    return Err(AudioError::UnsupportedFormat(format!(
                        "{} channels",
                        channels
                    )));
                }
                if bits_per_sample != 16 {
                    return Err(AudioError::UnsupportedFormat(format!(
                        "{} bits per sample",
                        bits_per_sample
                    )));
                }
                if sample_rate == 0 {
                    return Err(AudioError::CorruptContainer("zero sample rate".into()));
                }

                fmt = Some((format_code, channels, sample_rate, bits_per_sample));

                // Extension bytes beyond the 16 we consumed, plus pad.
                let remainder = declared - 16 + (declared & 1);
                pos = skip(source, pos, remainder)?;
            }
            b"data" => {
                let (_, channels, sample_rate, bits_per_sample) = fmt.ok_or_else(|| {
                    AudioError::CorruptContainer("data chunk before fmt".into())
                })?;

                let data_offset = pos;
                let remaining = source_len.saturating_sub(data_offset);
                // Truncated recordings declare more than the file holds.
                let data_size = declared.min(remaining);
                if data_size < 2 {
                    return Err(AudioError::CorruptContainer(
                        "fewer than 2 PCM bytes".into(),
                    ));
                }

                return Ok(WavInfo {
                    sample_rate,
                    channels,
                    bits_per_sample,
                    data_offset,
                    data_size,
                });
            }
            _ => {
                // Unknown chunk: skip body plus the odd-size pad byte.
                pos = skip(source, pos, declared + (declared & 1))?;
            }
        }
    }
}

/// Read the clamped PCM payload as interleaved f32 samples in [-1, 1].
///
/// A trailing odd byte (half a 16-bit sample) is discarded.
pub fn read_samples(path: &Path) -> Result<(WavInfo, Vec<f32>), AudioError> {
    let mut file = File::open(path).map_err(AudioError::io)?;
    let info = parse(&mut file)?;

    file.seek(SeekFrom::Start(info.data_offset))
        .map_err(AudioError::io)?;
    let mut raw = vec![0u8; info.data_size as usize];
    file.read_exact(&mut raw).map_err(AudioError::io)?;

    let samples = raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect();

    Ok((info, samples))
}

fn skip<R: Read + Seek>(source: &mut R, pos: u64, count: u64) -> Result<u64, AudioError> {
    source
        .seek(SeekFrom::Current(count as i64))
        .map_err(AudioError::io)?;
    Ok(pos + count)
}
