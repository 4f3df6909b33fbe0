/// Which microphone a capture should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicSource {
    /// Whatever the platform currently routes input from.
    #[default]
    Default,
    /// Force the built-in microphone even when Bluetooth is connected.
    PhoneMic,
    /// The Bluetooth hands-free (SCO) microphone. Fails with
    /// `DeviceUnavailable` when no hands-free link is present.
    HandsFreeMic,
}

/// Configuration for a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Output channels. Only mono and stereo are supported.
    pub channels: u16,
    /// PCM bit depth. Only 16-bit output is supported.
    pub bits_per_sample: u16,
    pub source: MicSource,
}

impl RecordConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.bits_per_sample != 16 {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        Ok(())
    }

    /// Bytes of PCM per second of audio at this configuration.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
            source: MicSource::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_voice_quality() {
        let config = RecordConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.byte_rate(), 32_000);
    }

    #[test]
    fn rejects_surround() {
        let config = RecordConfig {
            channels: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_24_bit() {
        let config = RecordConfig {
            bits_per_sample: 24,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
