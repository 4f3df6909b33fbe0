//! Capture engine.
//!
//! Data flow, with the platform provider on the left:
//!
//! ```text
//! [CaptureProvider] → callback → [RingBuffer] → drain thread → [WavFileWriter]
//! ```
//!
//! The provider delivers f32 buffers at whatever rate and channel count
//! the device negotiated; the callback normalizes them to the configured
//! output format and parks them in the ring buffer. A dedicated drain
//! thread appends 16-bit PCM to the file in strict order, so `stop()`
//! observes every write of its session by joining that thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::config::RecordConfig;
use crate::models::error::AudioError;
use crate::models::result::{RecordingMetadata, RecordingResult};
use crate::models::state::RecorderPhase;
use crate::processing::pcm;
use crate::processing::ring_buffer::RingBuffer;
use crate::storage::metadata;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::session_delegate::SessionDelegate;
use crate::wav::{PcmSpec, WavFileWriter};

/// How long `stop()` waits for the drain thread before force-finalizing.
const DRAIN_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Drain tick interval while recording.
const DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Ring buffer capacity, in seconds of audio at the output rate.
const BUFFER_SECONDS: u32 = 5;

struct ActiveSession {
    destination: PathBuf,
    config: RecordConfig,
    started_at: Instant,
    writer: Arc<Mutex<Option<WavFileWriter>>>,
    buffer: Arc<Mutex<RingBuffer>>,
    drain_running: Arc<AtomicBool>,
    drain_done: mpsc::Receiver<()>,
    capture_dead: Arc<AtomicBool>,
}

/// Records one session at a time from a platform capture provider into a
/// WAV file.
pub struct Recorder<P: CaptureProvider> {
    provider: P,
    phase: RecorderPhase,
    session: Option<ActiveSession>,
    delegate: Option<Arc<dyn SessionDelegate>>,
}

impl<P: CaptureProvider> Recorder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            phase: RecorderPhase::Idle,
            session: None,
            delegate: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn phase(&self) -> RecorderPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.phase.is_recording()
    }

    /// Start capturing into `destination`.
    ///
    /// The destination is created with a provisional container header
    /// before any audio is written, so a crash mid-recording leaves a
    /// structurally valid file. Fails with `SessionAlreadyActive` when a
    /// session is open and `DeviceUnavailable` when the requested source
    /// cannot be opened.
    pub fn start(&mut self, destination: &Path, config: RecordConfig) -> Result<(), AudioError> {
        if !self.phase.is_idle() {
            return Err(AudioError::SessionAlreadyActive);
        }
        config.validate().map_err(AudioError::UnsupportedFormat)?;

        let spec = PcmSpec {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bits_per_sample: config.bits_per_sample,
        };
        let writer = Arc::new(Mutex::new(Some(WavFileWriter::create(destination, spec)?)));

        let capacity = (config.sample_rate * config.channels as u32 * BUFFER_SECONDS) as usize;
        let buffer = Arc::new(Mutex::new(RingBuffer::new(capacity)));
        let capture_dead = Arc::new(AtomicBool::new(false));

        // Normalize device buffers to the output format and park them.
        let on_buffer = {
            let buffer = Arc::clone(&buffer);
            let out_channels = config.channels as usize;
            let out_rate = config.sample_rate as f64;
            Arc::new(move |samples: &[f32], rate: f64, channels: u16| {
                let mono = pcm::downmix_to_mono(samples, channels as usize);
                let resampled = pcm::resample(&mono, rate, out_rate);
                if out_channels == 2 {
                    // Mic audio is mono; duplicate into both channels.
                    let mut interleaved = Vec::with_capacity(resampled.len() * 2);
                    for &sample in &resampled {
                        interleaved.push(sample);
                        interleaved.push(sample);
                    }
                    buffer.lock().push(&interleaved);
                } else {
                    buffer.lock().push(&resampled);
                }
            })
        };

        let on_fatal = {
            let capture_dead = Arc::clone(&capture_dead);
            let delegate = self.delegate.clone();
            Arc::new(move |err: AudioError| {
                log::error!("capture device torn down: {}", err);
                capture_dead.store(true, Ordering::SeqCst);
                if let Some(ref d) = delegate {
                    d.on_error(&err);
                }
            })
        };

        if let Err(err) = self.provider.start(config.source, on_buffer, on_fatal) {
            // Don't leave a zero-length stub behind for a session that
            // never opened a device.
            writer.lock().take();
            std::fs::remove_file(destination).ok();
            return Err(err);
        }

        let drain_running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();
        {
            let running = Arc::clone(&drain_running);
            let buffer = Arc::clone(&buffer);
            let writer = Arc::clone(&writer);
            let delegate = self.delegate.clone();
            thread::Builder::new()
                .name("capture-drain".into())
                .spawn(move || {
                    while running.load(Ordering::SeqCst) {
                        thread::sleep(DRAIN_INTERVAL);
                        drain(&buffer, &writer, delegate.as_deref());
                    }
                    // Final flush before signaling completion.
                    drain(&buffer, &writer, delegate.as_deref());
                    let _ = done_tx.send(());
                })
                .expect("failed to spawn drain thread");
        }

        self.session = Some(ActiveSession {
            destination: destination.to_path_buf(),
            config,
            started_at: Instant::now(),
            writer,
            buffer,
            drain_running,
            drain_done: done_rx,
            capture_dead,
        });
        self.set_phase(RecorderPhase::Recording);
        Ok(())
    }

    /// Stop the session and finalize the file.
    ///
    /// Defensive: with no active session this returns a zero result
    /// rather than failing, so callers can always stop. Never hangs: the
    /// drain thread join is bounded, after which whatever was flushed is
    /// reported.
    pub fn stop(&mut self) -> RecordingResult {
        let Some(session) = self.session.take() else {
            return RecordingResult::empty();
        };
        self.set_phase(RecorderPhase::Stopping);

        if let Err(err) = self.provider.stop() {
            // A torn-down device still yields the partial capture.
            log::warn!("capture provider stop failed: {}", err);
        }

        session.drain_running.store(false, Ordering::SeqCst);
        if session.drain_done.recv_timeout(DRAIN_JOIN_TIMEOUT).is_err() {
            log::warn!("drain thread did not settle in time; finalizing with flushed data");
        }
        // The drain thread's final pass already flushed; this covers the
        // force-finalize path where it never got there.
        drain(&session.buffer, &session.writer, self.delegate.as_deref());

        let elapsed = session.started_at.elapsed();
        let result = finalize(&session, elapsed);

        if session.capture_dead.load(Ordering::SeqCst) {
            log::warn!(
                "session ended by device teardown; reporting partial capture of {:.2}s",
                result.duration_secs
            );
        }

        self.set_phase(RecorderPhase::Idle);
        if let Some(ref delegate) = self.delegate {
            delegate.on_recording_finished(&result);
        }
        result
    }

    fn set_phase(&mut self, phase: RecorderPhase) {
        self.phase = phase;
        if let Some(ref delegate) = self.delegate {
            delegate.on_phase_changed(phase);
        }
    }
}

/// Move everything the ring buffer holds into the file, in order.
fn drain(
    buffer: &Mutex<RingBuffer>,
    writer: &Mutex<Option<WavFileWriter>>,
    delegate: Option<&dyn SessionDelegate>,
) {
    loop {
        let samples = {
            let mut buf = buffer.lock();
            let available = buf.len();
            if available == 0 {
                return;
            }
            buf.pop(available)
        };
        let bytes = pcm::to_i16_le_bytes(&samples);
        let mut guard = writer.lock();
        let Some(w) = guard.as_mut() else {
            return;
        };
        if let Err(err) = w.append(&bytes) {
            // Recoverable: log, surface, keep the loop alive.
            log::error!("failed to append {} PCM bytes: {}", bytes.len(), err);
            if let Some(d) = delegate {
                d.on_error(&err);
            }
        }
    }
}

fn finalize(session: &ActiveSession, elapsed: Duration) -> RecordingResult {
    let config = &session.config;
    let taken = session.writer.lock().take();

    let (data_bytes, total_bytes, checksum) = match taken.map(WavFileWriter::finalize) {
        Some(Ok(finalized)) => finalized,
        Some(Err(err)) => {
            log::error!("failed to finalize container: {}", err);
            (0, 0, String::new())
        }
        None => (0, 0, String::new()),
    };

    // Byte-count duration when any audio landed; wall clock otherwise.
    let duration_secs = if data_bytes > 0 {
        data_bytes as f64 / config.byte_rate() as f64
    } else {
        elapsed.as_secs_f64()
    };

    let meta = RecordingMetadata::new(
        duration_secs,
        &session.destination.to_string_lossy(),
        total_bytes,
        config.sample_rate,
        config.channels,
        config.bits_per_sample,
        &checksum,
    );
    if let Err(err) = metadata::write_sidecar(&meta, &session.destination) {
        log::warn!("failed to write metadata sidecar: {}", err);
    }

    RecordingResult {
        file_path: session.destination.clone(),
        duration_secs,
        size_bytes: total_bytes,
        metadata: meta,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::models::config::MicSource;
    use crate::models::device::{AudioDevice, DeviceKind};
    use crate::traits::capture_provider::{AudioBufferCallback, CaptureFatalCallback};
    use crate::wav;

    /// Provider that synchronously delivers a canned buffer on start.
    struct MockProvider {
        native_rate: f64,
        sample_count: usize,
        hands_free_present: bool,
        fatal_after: Option<usize>,
        starts: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn silence(seconds: f64) -> Self {
            Self {
                native_rate: 16_000.0,
                sample_count: (seconds * 16_000.0) as usize,
                hands_free_present: true,
                fatal_after: None,
                starts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CaptureProvider for MockProvider {
        fn is_available(&self, source: MicSource) -> bool {
            source != MicSource::HandsFreeMic || self.hands_free_present
        }

        fn start(
            &mut self,
            source: MicSource,
            on_buffer: AudioBufferCallback,
            on_fatal: CaptureFatalCallback,
        ) -> Result<(), AudioError> {
            if source == MicSource::HandsFreeMic && !self.hands_free_present {
                return Err(AudioError::DeviceUnavailable(
                    "no hands-free link".into(),
                ));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);

            let mut delivered = 0;
            let chunk = vec![0.0f32; 1_600];
            while delivered < self.sample_count {
                let take = chunk.len().min(self.sample_count - delivered);
                on_buffer(&chunk[..take], self.native_rate, 1);
                delivered += take;
                if let Some(limit) = self.fatal_after {
                    if delivered >= limit {
                        on_fatal(AudioError::DeviceUnavailable("device removed".into()));
                        break;
                    }
                }
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            Ok(())
        }

        fn device_info(&self, _source: MicSource) -> Option<AudioDevice> {
            Some(AudioDevice::new("mock-mic", DeviceKind::BuiltInMic, "Mock Microphone"))
        }
    }

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_session_recorder_{}.wav", name))
    }

    fn cleanup(path: &Path) {
        std::fs::remove_file(path).ok();
        std::fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn two_seconds_of_silence_scenario() {
        let path = temp_wav("two_seconds");
        let mut recorder = Recorder::new(MockProvider::silence(2.0));

        recorder.start(&path, RecordConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(120));
        let result = recorder.stop();

        assert!(result.duration_secs >= 1.0 && result.duration_secs <= 3.0);
        assert_eq!(result.size_bytes, 2 * 16_000 * 2 + 44);
        assert_eq!(result.file_path, path);
        assert!(!result.metadata.checksum.is_empty());

        cleanup(&path);
    }

    #[test]
    fn written_file_round_trips_through_reader() {
        let path = temp_wav("round_trip");
        let mut recorder = Recorder::new(MockProvider::silence(0.5));

        recorder.start(&path, RecordConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(80));
        let result = recorder.stop();

        let info = wav::parse_file(&path).unwrap();
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.data_size, result.size_bytes - 44);

        cleanup(&path);
    }

    #[test]
    fn stop_without_session_returns_zero_result() {
        let mut recorder = Recorder::new(MockProvider::silence(1.0));
        let result = recorder.stop();
        assert_eq!(result.duration_secs, 0.0);
        assert_eq!(result.size_bytes, 0);
    }

    #[test]
    fn double_start_fails_fast() {
        let path = temp_wav("double_start");
        let other = temp_wav("double_start_other");
        let mut recorder = Recorder::new(MockProvider::silence(5.0));

        recorder.start(&path, RecordConfig::default()).unwrap();
        let err = recorder.start(&other, RecordConfig::default()).unwrap_err();
        assert_eq!(err, AudioError::SessionAlreadyActive);

        recorder.stop();
        cleanup(&path);
        cleanup(&other);
    }

    #[test]
    fn hands_free_request_without_link_fails_and_removes_stub() {
        let path = temp_wav("no_hands_free");
        let mut provider = MockProvider::silence(1.0);
        provider.hands_free_present = false;
        let starts = Arc::clone(&provider.starts);
        let mut recorder = Recorder::new(provider);

        let config = RecordConfig {
            source: MicSource::HandsFreeMic,
            ..Default::default()
        };
        let err = recorder.start(&path, config).unwrap_err();
        assert!(matches!(err, AudioError::DeviceUnavailable(_)));
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
        assert!(recorder.phase().is_idle());
    }

    #[test]
    fn device_teardown_yields_partial_capture() {
        let path = temp_wav("teardown");
        let mut provider = MockProvider::silence(2.0);
        provider.fatal_after = Some(8_000); // half a second in
        let mut recorder = Recorder::new(provider);

        recorder.start(&path, RecordConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(80));
        let result = recorder.stop();

        assert!(result.duration_secs > 0.0);
        assert!(result.duration_secs < 1.0);
        assert!(result.size_bytes > 44);

        cleanup(&path);
    }

    #[test]
    fn capture_resamples_to_configured_rate() {
        let path = temp_wav("resample");
        let mut provider = MockProvider::silence(0.0);
        provider.native_rate = 32_000.0;
        provider.sample_count = 32_000; // one second at the native rate
        let mut recorder = Recorder::new(provider);

        recorder.start(&path, RecordConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(80));
        let result = recorder.stop();

        // One second of audio regardless of the device's native rate.
        assert!((result.duration_secs - 1.0).abs() < 0.05);

        cleanup(&path);
    }
}
