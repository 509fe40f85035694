//! Real audio backend: symphonia decode, rubato resample, cpal output
//!
//! The output stream is opened lazily on the first `open` and kept alive on
//! a dedicated thread (cpal streams are not `Send`). Every source is a voice
//! in the shared [`Mixer`]; dropping the source removes the voice.

use futures::future::{self, BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use super::{local_path, PlaybackBackend, PlaybackSource, SourceRequest};
use crate::audio::decoder::SimpleDecoder;
use crate::audio::mixer::{lock_voice, Mixer, SharedVoice, Voice};
use crate::audio::output::AudioOutput;
use crate::audio::resampler::Resampler;
use crate::error::{Error, Result};

struct OutputThread {
    sample_rate: u32,
    error_flag: Arc<AtomicBool>,
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

pub struct CpalBackend {
    device: Option<String>,
    mixer: Arc<Mixer>,
    output: Mutex<Option<OutputThread>>,
}

impl CpalBackend {
    /// Backend for the named output device (None = system default)
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            mixer: Arc::new(Mixer::new()),
            output: Mutex::new(None),
        }
    }

    pub fn list_devices() -> Result<Vec<String>> {
        AudioOutput::list_devices()
    }

    /// Start the output thread if needed; returns the device rate and error flag
    fn ensure_output(&self) -> Result<(u32, Arc<AtomicBool>)> {
        let mut guard = self.output.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(output) = guard.as_ref() {
            return Ok((output.sample_rate, Arc::clone(&output.error_flag)));
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, Arc<AtomicBool>)>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let device = self.device.clone();
        let mixer = Arc::clone(&self.mixer);

        let handle = std::thread::Builder::new()
            .name("soundboard-audio".to_string())
            .spawn(move || {
                let started = AudioOutput::new(device.as_deref()).and_then(|mut output| {
                    output.start(mixer)?;
                    Ok(output)
                });
                let mut output = match started {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok((output.sample_rate(), output.error_flag())));

                // Stream lives until shutdown is signalled or the backend is dropped
                let _ = shutdown_rx.recv();
                if let Err(e) = output.stop() {
                    warn!("Failed to stop audio stream: {}", e);
                }
                if output.error_count() > 0 {
                    warn!("Audio stream reported {} errors", output.error_count());
                }
            })?;

        let (sample_rate, error_flag) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        info!("Audio output running at {}Hz", sample_rate);
        *guard = Some(OutputThread {
            sample_rate,
            error_flag: Arc::clone(&error_flag),
            shutdown: shutdown_tx,
            handle: Some(handle),
        });
        Ok((sample_rate, error_flag))
    }
}

impl PlaybackBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&self, request: &SourceRequest<'_>) -> Result<Box<dyn PlaybackSource>> {
        let path = local_path(request)?;
        if !path.is_file() {
            return Err(Error::source_error(
                request.track_id,
                format!("file not found: {}", path.display()),
            ));
        }

        let decoded = SimpleDecoder::decode_file(&path)?;
        let (device_rate, error_flag) = self.ensure_output()?;
        let samples = Resampler::resample(&decoded.samples, decoded.sample_rate, device_rate, 2)?;

        debug!(
            "Opened {} ({:.2}s) for track {}",
            path.display(),
            decoded.duration_secs(),
            request.track_id
        );

        let voice = self.mixer.add(Voice::new(samples));
        Ok(Box::new(CpalSource {
            voice,
            sample_rate: device_rate,
            error_flag,
            end_reported: false,
        }))
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let output = self
            .output
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut output) = output {
            let _ = output.shutdown.send(());
            if let Some(handle) = output.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

struct CpalSource {
    voice: SharedVoice,
    sample_rate: u32,
    error_flag: Arc<AtomicBool>,
    end_reported: bool,
}

impl PlaybackSource for CpalSource {
    fn play(&mut self) -> BoxFuture<'static, Result<()>> {
        future::ready(self.resume()).boxed()
    }

    fn resume(&mut self) -> Result<()> {
        if self.error_flag.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("output stream has failed".to_string()));
        }
        lock_voice(&self.voice).set_playing(true);
        Ok(())
    }

    fn pause(&mut self) {
        lock_voice(&self.voice).set_playing(false);
    }

    fn set_volume(&mut self, volume: f32) {
        lock_voice(&self.voice).set_volume(volume);
    }

    fn volume(&self) -> f32 {
        lock_voice(&self.voice).volume()
    }

    fn position(&self) -> f64 {
        lock_voice(&self.voice).cursor() as f64 / self.sample_rate as f64
    }

    fn seek(&mut self, seconds: f64) {
        let frame = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        lock_voice(&self.voice).seek(frame);
    }

    fn duration(&self) -> Option<f64> {
        Some(lock_voice(&self.voice).frames() as f64 / self.sample_rate as f64)
    }

    fn is_playing(&self) -> bool {
        lock_voice(&self.voice).is_playing()
    }

    fn take_ended(&mut self) -> bool {
        let ended = lock_voice(&self.voice).has_ended();
        if !ended {
            self.end_reported = false;
            return false;
        }
        if self.end_reported {
            return false;
        }
        self.end_reported = true;
        true
    }
}
