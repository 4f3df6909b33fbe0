use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::{MicSource, RecordConfig};
use crate::models::device::RouteSnapshot;
use crate::models::error::AudioError;
use crate::models::result::RecordingResult;
use crate::models::state::PlaybackOutcome;
use crate::player::{CompletionCallback, Player};
use crate::recorder::Recorder;
use crate::route::{RouteCallback, RouteMonitor};
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::hands_free::HandsFreeControl;
use crate::traits::playback_sink::PlaybackSink;
use crate::traits::route_provider::RouteProvider;
use crate::traits::session_delegate::SessionDelegate;

/// Default watchdog bound for one playback operation.
pub const DEFAULT_PLAYBACK_WATCHDOG: Duration = Duration::from_secs(300);

/// Options for one playback operation.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackOptions {
    /// Engage the hands-free link for the duration of playback.
    pub use_hands_free: bool,
    /// Upper bound before the session is force-stopped with `TimedOut`.
    pub watchdog: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            use_hands_free: false,
            watchdog: DEFAULT_PLAYBACK_WATCHDOG,
        }
    }
}

/// Caller-side view of an in-flight playback session.
///
/// The outcome arrives exactly once, from whichever of natural
/// completion, explicit stop, or the watchdog resolves first.
pub struct PlaybackTicket {
    outcome: mpsc::Receiver<PlaybackOutcome>,
}

impl PlaybackTicket {
    /// Block until the session resolves. Bounded by the watchdog, so
    /// this cannot hang indefinitely on a stuck native callback.
    pub fn wait(self) -> PlaybackOutcome {
        self.outcome
            .recv()
            .unwrap_or(PlaybackOutcome::Failed(AudioError::Io(
                "completion channel closed".into(),
            )))
    }

    /// Non-blocking poll for the outcome.
    pub fn try_outcome(&self) -> Option<PlaybackOutcome> {
        self.outcome.try_recv().ok()
    }
}

struct Inner<C, S, H, R>
where
    C: CaptureProvider,
    S: PlaybackSink,
    H: HandsFreeControl,
    R: RouteProvider,
{
    recorder: Mutex<Recorder<C>>,
    player: Mutex<Player<S>>,
    hands_free: Mutex<H>,
    routes: RouteMonitor<R>,
    auto_stop: Mutex<Option<mpsc::Sender<()>>>,
}

/// Arbiter of the audio session.
///
/// Owns the three engines and is the sole mutator of hands-free
/// engagement, so independent call paths cannot fight over the link. At
/// most one recording and one playback session exist system-wide,
/// independent of each other. Every public entry point is safe to call
/// from any thread.
pub struct SessionCoordinator<C, S, H, R>
where
    C: CaptureProvider,
    S: PlaybackSink,
    H: HandsFreeControl,
    R: RouteProvider,
{
    inner: Arc<Inner<C, S, H, R>>,
}

impl<C, S, H, R> SessionCoordinator<C, S, H, R>
where
    C: CaptureProvider + 'static,
    S: PlaybackSink + 'static,
    H: HandsFreeControl + 'static,
    R: RouteProvider + 'static,
{
    pub fn new(capture: C, sink: S, hands_free: H, routes: R) -> Self {
        Self {
            inner: Arc::new(Inner {
                recorder: Mutex::new(Recorder::new(capture)),
                player: Mutex::new(Player::new(sink)),
                hands_free: Mutex::new(hands_free),
                routes: RouteMonitor::new(routes),
                auto_stop: Mutex::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        self.inner.recorder.lock().set_delegate(delegate);
    }

    // --- Route observation ---

    pub fn current_route(&self) -> Result<RouteSnapshot, AudioError> {
        self.inner.routes.current_route()
    }

    pub fn watch_routes(&self, on_change: RouteCallback) -> Result<(), AudioError> {
        self.inner.routes.start_watching(on_change)
    }

    pub fn unwatch_routes(&self) {
        self.inner.routes.stop_watching()
    }

    // --- Recording ---

    pub fn is_recording(&self) -> bool {
        self.inner.recorder.lock().is_recording()
    }

    /// Start a recording, optionally auto-stopping after `duration_hint`.
    ///
    /// Requesting `HandsFreeMic` engages the Bluetooth voice link before
    /// the device is opened and releases it on every exit path.
    pub fn start_recording(
        &self,
        destination: &Path,
        config: RecordConfig,
        duration_hint: Option<Duration>,
    ) -> Result<(), AudioError> {
        let mut recorder = self.inner.recorder.lock();
        if recorder.is_recording() {
            return Err(AudioError::SessionAlreadyActive);
        }

        let uses_hands_free = config.source == MicSource::HandsFreeMic;
        if uses_hands_free {
            self.inner.hands_free.lock().engage()?;
        }

        if let Err(err) = recorder.start(destination, config) {
            if uses_hands_free {
                self.inner.hands_free.lock().release();
            }
            return Err(err);
        }
        drop(recorder);

        if let Some(limit) = duration_hint {
            self.arm_auto_stop(limit);
        }
        Ok(())
    }

    /// Stop the active recording and return its result.
    ///
    /// Defensive like the engine: with no active session this returns a
    /// zero result. Cancels a pending auto-stop timer, so an explicit
    /// stop never races the deferred one into a double finish.
    pub fn stop_recording(&self) -> RecordingResult {
        if let Some(cancel) = self.inner.auto_stop.lock().take() {
            let _ = cancel.send(());
        }
        finish_recording(&self.inner)
    }

    fn arm_auto_stop(&self, limit: Duration) {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        *self.inner.auto_stop.lock() = Some(cancel_tx);

        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("record-auto-stop".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(limit) {
                    log::debug!("duration hint of {:?} elapsed; stopping recording", limit);
                    inner.auto_stop.lock().take();
                    finish_recording(&inner);
                }
            })
            .expect("failed to spawn auto-stop thread");
    }

    // --- Playback ---

    /// Start playing `source` through the active output device.
    ///
    /// Returns immediately with a ticket resolving exactly once. The
    /// session races a watchdog: a sink that never completes is
    /// force-stopped and the ticket resolves with `TimedOut`, with the
    /// hands-free link released either way.
    pub fn play(
        &self,
        source: &Path,
        options: PlaybackOptions,
    ) -> Result<PlaybackTicket, AudioError> {
        if options.use_hands_free {
            self.inner.hands_free.lock().engage()?;
        }

        let (outcome_tx, outcome_rx) = mpsc::channel();
        let (disarm_tx, disarm_rx) = mpsc::channel();

        let callback: CompletionCallback = {
            let inner = Arc::clone(&self.inner);
            let uses_hands_free = options.use_hands_free;
            Box::new(move |outcome| {
                if uses_hands_free {
                    inner.hands_free.lock().release();
                }
                let _ = disarm_tx.send(());
                let _ = outcome_tx.send(outcome);
            })
        };

        let mut player = self.inner.player.lock();
        if let Err(err) = player.play(source, callback) {
            if options.use_hands_free {
                self.inner.hands_free.lock().release();
            }
            return Err(err);
        }
        drop(player);

        // Race the session against the watchdog. Resolution disarms it
        // through the channel, so a completed session never sees a
        // spurious late timeout.
        let inner = Arc::clone(&self.inner);
        let limit = options.watchdog;
        thread::Builder::new()
            .name("playback-watchdog".into())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = disarm_rx.recv_timeout(limit) {
                    log::warn!("playback did not resolve within {:?}; forcing stop", limit);
                    inner.player.lock().stop_with(PlaybackOutcome::TimedOut);
                }
            })
            .expect("failed to spawn watchdog thread");

        Ok(PlaybackTicket {
            outcome: outcome_rx,
        })
    }

    /// Stop the active playback, resolving its ticket with `Stopped`.
    /// Idempotent when nothing is playing.
    pub fn stop_playback(&self) {
        self.inner.player.lock().stop();
    }
}

fn finish_recording<C, S, H, R>(inner: &Inner<C, S, H, R>) -> RecordingResult
where
    C: CaptureProvider,
    S: PlaybackSink,
    H: HandsFreeControl,
    R: RouteProvider,
{
    let result = inner.recorder.lock().stop();
    // Sole mutator: restore the default audio mode regardless of which
    // path requested the link.
    inner.hands_free.lock().release();
    result
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::models::device::AudioDevice;
    use crate::player::{CompletionGuard, PlaybackCursor};
    use crate::traits::capture_provider::{AudioBufferCallback, CaptureFatalCallback};
    use crate::traits::route_provider::RouteChangeCallback;
    use crate::wav::{PcmSpec, WavFileWriter};

    // --- Mock backends ---

    struct MockCapture {
        seconds: f64,
    }

    impl CaptureProvider for MockCapture {
        fn is_available(&self, _source: MicSource) -> bool {
            true
        }

        fn start(
            &mut self,
            _source: MicSource,
            on_buffer: AudioBufferCallback,
            _on_fatal: CaptureFatalCallback,
        ) -> Result<(), AudioError> {
            let samples = vec![0.0f32; (self.seconds * 16_000.0) as usize];
            on_buffer(&samples, 16_000.0, 1);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            Ok(())
        }

        fn device_info(&self, _source: MicSource) -> Option<AudioDevice> {
            None
        }
    }

    struct MockSink {
        complete_naturally: bool,
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
            if self.complete_naturally {
                thread::spawn(move || {
                    while cursor.take(512).is_some() {}
                    completion.resolve(PlaybackOutcome::Completed);
                });
            }
            Ok(())
        }

        fn stop(&mut self) {}
    }

    #[derive(Clone)]
    struct MockHandsFree {
        available: Arc<AtomicBool>,
        engaged: Arc<AtomicBool>,
        engages: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    impl MockHandsFree {
        fn new(available: bool) -> Self {
            Self {
                available: Arc::new(AtomicBool::new(available)),
                engaged: Arc::new(AtomicBool::new(false)),
                engages: Arc::new(AtomicUsize::new(0)),
                releases: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl HandsFreeControl for MockHandsFree {
        fn is_available(&self) -> bool {
            self.available.load(Ordering::SeqCst)
        }

        fn engage(&mut self) -> Result<(), AudioError> {
            if !self.available.load(Ordering::SeqCst) {
                return Err(AudioError::DeviceUnavailable("no hands-free link".into()));
            }
            self.engaged.store(true, Ordering::SeqCst);
            self.engages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&mut self) {
            self.engaged.store(false, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn is_engaged(&self) -> bool {
            self.engaged.load(Ordering::SeqCst)
        }
    }

    struct MockRoutes;

    impl RouteProvider for MockRoutes {
        fn snapshot(&self) -> Result<RouteSnapshot, AudioError> {
            Ok(RouteSnapshot::empty())
        }

        fn subscribe(&mut self, _on_event: RouteChangeCallback) -> Result<(), AudioError> {
            Ok(())
        }

        fn unsubscribe(&mut self) {}
    }

    fn coordinator(
        sink: MockSink,
        hands_free: MockHandsFree,
    ) -> SessionCoordinator<MockCapture, MockSink, MockHandsFree, MockRoutes> {
        SessionCoordinator::new(MockCapture { seconds: 0.25 }, sink, hands_free, MockRoutes)
    }

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_session_coordinator_{}.wav", name))
    }

    fn fixture_wav(name: &str) -> PathBuf {
        let path = temp_wav(name);
        let spec = PcmSpec {
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
        };
        let mut writer = WavFileWriter::create(&path, spec).unwrap();
        writer.append(&vec![0u8; 3_200]).unwrap();
        writer.finalize().unwrap();
        path
    }

    fn cleanup(path: &PathBuf) {
        std::fs::remove_file(path).ok();
        std::fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn hands_free_recording_engages_and_releases() {
        let hands_free = MockHandsFree::new(true);
        let coordinator = coordinator(MockSink { complete_naturally: true }, hands_free.clone());
        let path = temp_wav("hands_free");

        let config = RecordConfig {
            source: MicSource::HandsFreeMic,
            ..Default::default()
        };
        coordinator.start_recording(&path, config, None).unwrap();
        assert!(hands_free.is_engaged());

        let result = coordinator.stop_recording();
        assert!(result.size_bytes > 44);
        assert!(!hands_free.is_engaged());
        assert_eq!(hands_free.releases.load(Ordering::SeqCst), 1);

        cleanup(&path);
    }

    #[test]
    fn hands_free_engage_failure_surfaces_device_unavailable() {
        let hands_free = MockHandsFree::new(false);
        let coordinator = coordinator(MockSink { complete_naturally: true }, hands_free);
        let path = temp_wav("hands_free_missing");

        let config = RecordConfig {
            source: MicSource::HandsFreeMic,
            ..Default::default()
        };
        let err = coordinator.start_recording(&path, config, None).unwrap_err();
        assert!(matches!(err, AudioError::DeviceUnavailable(_)));
        assert!(!coordinator.is_recording());
    }

    #[test]
    fn concurrent_start_fails_with_session_already_active() {
        let coordinator = coordinator(
            MockSink { complete_naturally: true },
            MockHandsFree::new(true),
        );
        let path = temp_wav("exclusive_a");
        let other = temp_wav("exclusive_b");

        coordinator
            .start_recording(&path, RecordConfig::default(), None)
            .unwrap();
        let err = coordinator
            .start_recording(&other, RecordConfig::default(), None)
            .unwrap_err();
        assert_eq!(err, AudioError::SessionAlreadyActive);

        coordinator.stop_recording();
        cleanup(&path);
        cleanup(&other);
    }

    #[test]
    fn duration_hint_auto_stops_the_session() {
        let coordinator = coordinator(
            MockSink { complete_naturally: true },
            MockHandsFree::new(true),
        );
        let path = temp_wav("auto_stop");

        coordinator
            .start_recording(
                &path,
                RecordConfig::default(),
                Some(Duration::from_millis(100)),
            )
            .unwrap();
        assert!(coordinator.is_recording());

        thread::sleep(Duration::from_millis(400));
        assert!(!coordinator.is_recording());

        // The deferred stop already finished the session; a defensive
        // explicit stop gets the zero result, not a second finish.
        let result = coordinator.stop_recording();
        assert_eq!(result.size_bytes, 0);

        cleanup(&path);
    }

    #[test]
    fn explicit_stop_cancels_the_auto_stop_timer() {
        let hands_free = MockHandsFree::new(true);
        let coordinator = coordinator(
            MockSink { complete_naturally: true },
            hands_free.clone(),
        );
        let path = temp_wav("cancel_timer");

        coordinator
            .start_recording(
                &path,
                RecordConfig::default(),
                Some(Duration::from_millis(150)),
            )
            .unwrap();
        let result = coordinator.stop_recording();
        assert!(result.size_bytes > 44);

        // Let the would-be timer expire; the session must not be touched
        // again.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(hands_free.releases.load(Ordering::SeqCst), 1);

        cleanup(&path);
    }

    #[test]
    fn playback_resolves_completed_and_disarms_watchdog() {
        let hands_free = MockHandsFree::new(true);
        let coordinator = coordinator(
            MockSink { complete_naturally: true },
            hands_free.clone(),
        );
        let path = fixture_wav("playback_ok");

        let ticket = coordinator
            .play(
                &path,
                PlaybackOptions {
                    use_hands_free: true,
                    watchdog: Duration::from_millis(250),
                },
            )
            .unwrap();

        assert_eq!(ticket.wait(), PlaybackOutcome::Completed);
        assert!(!hands_free.is_engaged());

        // Outlive the watchdog window: no late force-stop may occur.
        thread::sleep(Duration::from_millis(400));
        assert_eq!(hands_free.releases.load(Ordering::SeqCst), 1);

        cleanup(&path);
    }

    #[test]
    fn stuck_sink_is_timed_out_by_the_watchdog() {
        let hands_free = MockHandsFree::new(true);
        let coordinator = coordinator(
            MockSink { complete_naturally: false },
            hands_free.clone(),
        );
        let path = fixture_wav("playback_stuck");

        let ticket = coordinator
            .play(
                &path,
                PlaybackOptions {
                    use_hands_free: true,
                    watchdog: Duration::from_millis(120),
                },
            )
            .unwrap();

        assert_eq!(ticket.wait(), PlaybackOutcome::TimedOut);
        assert!(!hands_free.is_engaged());

        cleanup(&path);
    }

    #[test]
    fn stop_playback_resolves_stopped() {
        let coordinator = coordinator(
            MockSink { complete_naturally: false },
            MockHandsFree::new(true),
        );
        let path = fixture_wav("playback_stopped");

        let ticket = coordinator.play(&path, PlaybackOptions::default()).unwrap();
        coordinator.stop_playback();
        assert_eq!(ticket.wait(), PlaybackOutcome::Stopped);

        // Idempotent with nothing playing.
        coordinator.stop_playback();

        cleanup(&path);
    }

    #[test]
    fn recording_and_playback_sessions_are_independent() {
        let coordinator = coordinator(
            MockSink { complete_naturally: false },
            MockHandsFree::new(true),
        );
        let record_path = temp_wav("independent_record");
        let play_path = fixture_wav("independent_play");

        coordinator
            .start_recording(&record_path, RecordConfig::default(), None)
            .unwrap();
        let ticket = coordinator.play(&play_path, PlaybackOptions::default()).unwrap();

        coordinator.stop_playback();
        assert_eq!(ticket.wait(), PlaybackOutcome::Stopped);
        let result = coordinator.stop_recording();
        assert!(result.size_bytes > 44);

        cleanup(&record_path);
        cleanup(&play_path);
    }
}
