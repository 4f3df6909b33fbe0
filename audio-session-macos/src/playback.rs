//! Playback through a cpal output stream.
//!
//! The render callback pulls from the playback cursor, resampling to the
//! device rate. Completion uses the stream's own presentation clock: the
//! first fully-silent callback records its playback instant (every real
//! frame is presented strictly before it), and the session resolves once
//! the device clock passes that instant. No fixed sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, StreamInstant};
use parking_lot::Mutex;

use audio_session_core::models::error::AudioError;
use audio_session_core::models::state::PlaybackOutcome;
use audio_session_core::player::{CompletionGuard, PlaybackCursor};
use audio_session_core::processing::pcm;
use audio_session_core::traits::playback_sink::PlaybackSink;

/// How much of the cursor to pull and resample per refill.
const CURSOR_CHUNK: usize = 2_048;

/// cpal output stream sink.
pub struct CoreAudioPlayback {
    running: Arc<AtomicBool>,
    render_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CoreAudioPlayback {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            render_handle: Mutex::new(None),
        }
    }
}

impl Default for CoreAudioPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for CoreAudioPlayback {
    fn is_available(&self) -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    fn start(
        &mut self,
        cursor: PlaybackCursor,
        completion: Arc<CompletionGuard>,
    ) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::SessionAlreadyActive);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("coreaudio-render".into())
            .spawn({
                let running = Arc::clone(&running);
                move || {
                    match build_stream(cursor, Arc::clone(&completion)) {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            // Keep the stream alive until stopped or
                            // resolved; streams are thread-owned.
                            while running.load(Ordering::SeqCst) && !completion.is_resolved() {
                                thread::sleep(Duration::from_millis(20));
                            }
                            drop(stream);
                        }
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                        }
                    }
                    running.store(false, Ordering::SeqCst);
                }
            })
            .map_err(|e| AudioError::Io(format!("failed to spawn render thread: {}", e)))?;

        *self.render_handle.lock() = Some(handle);

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

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.render_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn build_stream(
    cursor: PlaybackCursor,
    completion: Arc<CompletionGuard>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceUnavailable("no default output device".into()))?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceUnavailable(format!("no output config: {}", e)))?;

    match config.sample_format() {
        cpal::SampleFormat::F32 => build_typed::<f32>(&device, &config.into(), cursor, completion),
        cpal::SampleFormat::I16 => build_typed::<i16>(&device, &config.into(), cursor, completion),
        cpal::SampleFormat::U16 => build_typed::<u16>(&device, &config.into(), cursor, completion),
        other => Err(AudioError::UnsupportedFormat(format!(
            "output sample format {:?}",
            other
        ))),
    }
}

fn build_typed<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    cursor: PlaybackCursor,
    completion: Arc<CompletionGuard>,
) -> Result<cpal::Stream, AudioError> {
    let device_rate = config.sample_rate.0 as f64;
    let device_channels = config.channels as usize;

    let spec = cursor.spec();
    let source_rate = spec.sample_rate as f64;
    let source_channels = spec.channels as usize;

    // Mono staging at the device rate, owned by the render callback.
    let mut staging: Vec<f32> = Vec::new();
    let mut exhausted = false;
    let mut silence_started: Option<StreamInstant> = None;

    let render_completion = Arc::clone(&completion);
    let error_completion = completion;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / device_channels.max(1);

                while !exhausted && staging.len() < frames {
                    match cursor.take(CURSOR_CHUNK) {
                        Some(chunk) => {
                            let mono = pcm::downmix_to_mono(&chunk, source_channels);
                            staging.extend(pcm::resample(&mono, source_rate, device_rate));
                        }
                        None => exhausted = true,
                    }
                }

                let real = frames.min(staging.len());
                for frame in 0..frames {
                    let sample = if frame < real { staging[frame] } else { 0.0 };
                    let value = T::from_sample(sample);
                    for ch in 0..device_channels {
                        data[frame * device_channels + ch] = value;
                    }
                }
                staging.drain(..real);

                if exhausted && staging.is_empty() && real == 0 {
                    let timestamp = info.timestamp();
                    match silence_started {
                        None => {
                            // Every real frame presents before this
                            // buffer's playback instant.
                            silence_started = Some(timestamp.playback);
                        }
                        Some(deadline) => {
                            if timestamp.callback.duration_since(&deadline).is_some() {
                                render_completion.resolve(PlaybackOutcome::Completed);
                            }
                        }
                    }
                }
            },
            move |err| {
                log::error!("output stream error: {}", err);
                error_completion.resolve(PlaybackOutcome::Failed(AudioError::DeviceUnavailable(
                    err.to_string(),
                )));
            },
            None,
        )
        .map_err(|e| AudioError::DeviceUnavailable(format!("build stream failed: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::DeviceUnavailable(format!("stream play failed: {}", e)))?;

    Ok(stream)
}
