//! Microphone capture through a cpal input stream.
//!
//! cpal streams are not `Send`, so the stream lives entirely on a
//! dedicated thread: built there, kept alive by the thread's park loop,
//! dropped there when the run flag clears.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use audio_session_core::models::config::MicSource;
use audio_session_core::models::device::AudioDevice;
use audio_session_core::models::error::AudioError;
use audio_session_core::route::classify;
use audio_session_core::traits::capture_provider::{
    AudioBufferCallback, CaptureFatalCallback, CaptureProvider,
};

/// cpal input stream provider.
pub struct CoreAudioCapture {
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CoreAudioCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }
}

impl Default for CoreAudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the input device for a source.
fn resolve_device(source: MicSource) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match source {
        MicSource::Default => host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("no default input device".into())),
        MicSource::PhoneMic => find_input(&host, |name| !classify::is_bluetooth_name(name))
            .ok_or_else(|| AudioError::DeviceUnavailable("no wired microphone".into())),
        MicSource::HandsFreeMic => find_input(&host, classify::is_bluetooth_name)
            .ok_or_else(|| AudioError::DeviceUnavailable("no hands-free link present".into())),
    }
}

fn find_input(host: &cpal::Host, predicate: impl Fn(&str) -> bool) -> Option<cpal::Device> {
    host.input_devices()
        .ok()?
        .find(|device| device.name().map(|name| predicate(&name)).unwrap_or(false))
}

impl CaptureProvider for CoreAudioCapture {
    fn is_available(&self, source: MicSource) -> bool {
        resolve_device(source).is_ok()
    }

    fn start(
        &mut self,
        source: MicSource,
        on_buffer: AudioBufferCallback,
        on_fatal: CaptureFatalCallback,
    ) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::SessionAlreadyActive);
        }

        // Fail fast on the caller's thread when the source cannot exist.
        resolve_device(source)?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        // The stream must be built on the thread that owns it; report
        // build errors back through the channel so start() stays
        // synchronous about acquisition failures.
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("coreaudio-capture".into())
            .spawn({
                let running = Arc::clone(&running);
                move || {
                    build_and_run(source, on_buffer, on_fatal, &running, ready_tx);
                    running.store(false, Ordering::SeqCst);
                }
            })
            .map_err(|e| AudioError::Io(format!("failed to spawn capture thread: {}", e)))?;

        *self.capture_handle.lock() = Some(handle);

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                Err(AudioError::Timeout)
            }
        }
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self, source: MicSource) -> Option<AudioDevice> {
        let device = resolve_device(source).ok()?;
        let name = device.name().ok()?;
        let kind = classify::classify_name(&name, true);
        Some(AudioDevice::new(name.clone(), kind, name))
    }
}

/// Build the input stream, start it, signal readiness, then park until
/// the run flag clears. Build errors are relayed through `ready_tx` so
/// `start()` reports acquisition failures synchronously.
fn build_and_run(
    source: MicSource,
    on_buffer: AudioBufferCallback,
    on_fatal: CaptureFatalCallback,
    running: &Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<(), AudioError>>,
) {
    match build_stream(source, on_buffer, on_fatal) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
        }
    }
}

fn build_stream(
    source: MicSource,
    on_buffer: AudioBufferCallback,
    on_fatal: CaptureFatalCallback,
) -> Result<cpal::Stream, AudioError> {
    let device = resolve_device(source)?;
    let config = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceUnavailable(format!("no input config: {}", e)))?;

    let sample_rate = config.sample_rate().0 as f64;
    let channels = config.channels();
    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();

    let err_fn = move |err: cpal::StreamError| {
        log::error!("input stream error: {}", err);
        on_fatal(AudioError::DeviceUnavailable(err.to_string()));
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    on_buffer(data, sample_rate, channels);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::DeviceUnavailable(format!("build stream failed: {}", e)))?,
        cpal::SampleFormat::I16 => device
            .build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    on_buffer(&floats, sample_rate, channels);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::DeviceUnavailable(format!("build stream failed: {}", e)))?,
        other => {
            return Err(AudioError::UnsupportedFormat(format!(
                "input sample format {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(format!("stream play failed: {}", e)))?;

    Ok(stream)
}
