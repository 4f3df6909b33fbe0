use std::sync::Arc;

use parking_lot::Mutex;

use crate::wav::PcmSpec;

/// Shared read position over a decoded PCM buffer.
///
/// The player owns the decoded samples; the platform sink pulls from the
/// cursor inside its render callback. Cloning is cheap and shares the
/// position.
#[derive(Clone)]
pub struct PlaybackCursor {
    inner: Arc<Mutex<CursorInner>>,
    spec: PcmSpec,
}

struct CursorInner {
    samples: Vec<f32>,
    position: usize,
}

impl PlaybackCursor {
    pub fn new(samples: Vec<f32>, spec: PcmSpec) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CursorInner {
                samples,
                position: 0,
            })),
            spec,
        }
    }

    pub fn spec(&self) -> PcmSpec {
        self.spec
    }

    /// Take up to `count` samples, advancing the position.
    ///
    /// Returns `None` once every sample has been handed out; the sink
    /// treats that as end-of-stream and begins draining its device
    /// buffer.
    pub fn take(&self, count: usize) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        if inner.position >= inner.samples.len() {
            return None;
        }
        let end = (inner.position + count).min(inner.samples.len());
        let out = inner.samples[inner.position..end].to_vec();
        inner.position = end;
        Some(out)
    }

    pub fn is_exhausted(&self) -> bool {
        let inner = self.inner.lock();
        inner.position >= inner.samples.len()
    }

    pub fn duration_secs(&self) -> f64 {
        let inner = self.inner.lock();
        let frames = inner.samples.len() / self.spec.channels as usize;
        frames as f64 / self.spec.sample_rate as f64
    }

    /// Fraction of samples consumed so far, 0.0 to 1.0.
    pub fn progress(&self) -> f32 {
        let inner = self.inner.lock();
        if inner.samples.is_empty() {
            1.0
        } else {
            inner.position as f32 / inner.samples.len() as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PcmSpec {
        PcmSpec {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    #[test]
    fn take_advances_until_exhausted() {
        let cursor = PlaybackCursor::new(vec![0.1, 0.2, 0.3], spec());
        assert_eq!(cursor.take(2), Some(vec![0.1, 0.2]));
        assert!(!cursor.is_exhausted());
        assert_eq!(cursor.take(5), Some(vec![0.3]));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.take(1), None);
    }

    #[test]
    fn duration_follows_spec() {
        let cursor = PlaybackCursor::new(vec![0.0; 16_000], spec());
        assert!((cursor.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clones_share_position() {
        let cursor = PlaybackCursor::new(vec![0.0; 4], spec());
        let other = cursor.clone();
        cursor.take(3);
        assert_eq!(other.take(3), Some(vec![0.0]));
        assert!(other.is_exhausted());
    }
}
