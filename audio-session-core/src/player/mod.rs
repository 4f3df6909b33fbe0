//! Playback engine.
//!
//! Parses the container before any device resource is acquired, streams
//! decoded PCM to the platform sink through a shared [`PlaybackCursor`],
//! and funnels every way a session can end (natural completion, explicit
//! stop, watchdog, device failure) through one single-fire
//! [`CompletionGuard`].

pub mod completion;
pub mod cursor;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::AudioError;
use crate::models::state::{PlaybackOutcome, PlayerPhase};
use crate::traits::playback_sink::PlaybackSink;
use crate::wav;

pub use completion::{CompletionCallback, CompletionGuard};
pub use cursor::PlaybackCursor;

/// Streams one WAV file at a time to a platform sink.
///
/// At most one playback session exists at a time; `play()` during an
/// active session fails with `SessionAlreadyActive`.
pub struct Player<S: PlaybackSink> {
    sink: S,
    phase: Arc<Mutex<PlayerPhase>>,
    guard: Option<Arc<CompletionGuard>>,
}

impl<S: PlaybackSink> Player<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            phase: Arc::new(Mutex::new(PlayerPhase::Idle)),
            guard: None,
        }
    }

    pub fn phase(&self) -> PlayerPhase {
        *self.phase.lock()
    }

    /// Parse `source` and start streaming it to the output device.
    ///
    /// Returns as soon as rendering has started; `on_complete` observes
    /// the outcome exactly once. Container and format errors are
    /// returned before the sink is touched, so a rejected file acquires
    /// zero device resources.
    pub fn play(
        &mut self,
        source: &Path,
        on_complete: CompletionCallback,
    ) -> Result<Arc<CompletionGuard>, AudioError> {
        if !self.phase.lock().is_idle() {
            return Err(AudioError::SessionAlreadyActive);
        }

        let (info, samples) = wav::reader::read_samples(source)?;
        log::debug!(
            "playback source parsed: {} Hz, {} ch, {} PCM bytes",
            info.sample_rate,
            info.channels,
            info.data_size
        );

        let cursor = PlaybackCursor::new(samples, info.spec());

        let phase = Arc::clone(&self.phase);
        let guard = Arc::new(CompletionGuard::new(Box::new(move |outcome| {
            *phase.lock() = PlayerPhase::Idle;
            on_complete(outcome);
        })));

        *self.phase.lock() = PlayerPhase::Playing;
        if let Err(err) = self.sink.start(cursor, Arc::clone(&guard)) {
            *self.phase.lock() = PlayerPhase::Idle;
            return Err(err);
        }
        self.guard = Some(Arc::clone(&guard));
        Ok(guard)
    }

    /// Stop playback and resolve the session as `Stopped`. Idempotent;
    /// a no-op when nothing is playing.
    pub fn stop(&mut self) {
        self.stop_with(PlaybackOutcome::Stopped);
    }

    /// Stop playback resolving with an explicit outcome (the coordinator
    /// uses `TimedOut` when its watchdog fires).
    pub fn stop_with(&mut self, outcome: PlaybackOutcome) {
        if !self.phase.lock().is_playing() {
            return;
        }
        *self.phase.lock() = PlayerPhase::Stopping;
        self.sink.stop();
        if let Some(guard) = self.guard.take() {
            // Loses the race harmlessly if the sink resolved first.
            guard.resolve(outcome);
        }
        *self.phase.lock() = PlayerPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::wav::{PcmSpec, WavFileWriter};

    /// Sink that either drains the cursor on a worker thread or sits on
    /// it forever, for exercising both completion paths.
    struct MockSink {
        complete_naturally: bool,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl MockSink {
        fn new(complete_naturally: bool) -> Self {
            Self {
                complete_naturally,
                starts: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl PlaybackSink for MockSink {
        fn is_available(&self) -> bool {
            true
        }

        fn start(
            &mut self,
            cursor: PlaybackCursor,
            completion: Arc<CompletionGuard>,
        ) -> Result<(), AudioError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.complete_naturally {
                std::thread::spawn(move || {
                    while cursor.take(256).is_some() {}
                    completion.resolve(PlaybackOutcome::Completed);
                });
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixture_wav(name: &str, seconds: f64) -> PathBuf {
        let path = std::env::temp_dir().join(format!("audio_session_player_{}", name));
        let spec = PcmSpec {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        };
        let mut writer = WavFileWriter::create(&path, spec).unwrap();
        let bytes = (seconds * spec.byte_rate() as f64) as usize & !1;
        writer.append(&vec![0u8; bytes]).unwrap();
        writer.finalize().unwrap();
        path
    }

    fn outcome_channel() -> (CompletionCallback, mpsc::Receiver<PlaybackOutcome>) {
        let (tx, rx) = mpsc::channel();
        (Box::new(move |outcome| drop(tx.send(outcome))), rx)
    }

    #[test]
    fn natural_completion_fires_exactly_once() {
        let path = fixture_wav("natural.wav", 0.1);
        let mut player = Player::new(MockSink::new(true));

        let (callback, rx) = outcome_channel();
        player.play(&path, callback).unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed);

        // A defensive stop after completion must not fire again.
        player.stop();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(player.phase().is_idle());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn explicit_stop_resolves_stopped() {
        let path = fixture_wav("stopped.wav", 0.1);
        let mut player = Player::new(MockSink::new(false));

        let (callback, rx) = outcome_channel();
        player.play(&path, callback).unwrap();
        player.stop();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            PlaybackOutcome::Stopped
        );
        assert!(player.phase().is_idle());

        // Idempotent: a second stop does nothing.
        player.stop();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn second_play_fails_while_active() {
        let path = fixture_wav("exclusive.wav", 0.1);
        let mut player = Player::new(MockSink::new(false));

        let (callback, _rx) = outcome_channel();
        player.play(&path, callback).unwrap();

        let (callback, _rx2) = outcome_channel();
        let err = player.play(&path, callback).unwrap_err();
        assert_eq!(err, AudioError::SessionAlreadyActive);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejected_container_acquires_no_device() {
        let path = std::env::temp_dir().join("audio_session_player_junk.wav");
        std::fs::write(&path, b"NOT A RIFF FILE AT ALL........").unwrap();

        let sink = MockSink::new(true);
        let starts = Arc::clone(&sink.starts);
        let mut player = Player::new(sink);

        let (callback, _rx) = outcome_channel();
        let err = player.play(&path, callback).unwrap_err();
        assert!(matches!(err, AudioError::CorruptContainer(_)));
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert!(player.phase().is_idle());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn player_is_reusable_after_stop() {
        let path = fixture_wav("reuse.wav", 0.05);
        let mut player = Player::new(MockSink::new(true));

        for _ in 0..2 {
            let (callback, rx) = outcome_channel();
            player.play(&path, callback).unwrap();
            assert_eq!(
                rx.recv_timeout(Duration::from_secs(2)).unwrap(),
                PlaybackOutcome::Completed
            );
        }

        std::fs::remove_file(&path).ok();
    }
}
