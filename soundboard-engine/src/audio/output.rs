//! Audio output using cpal
//!
//! Opens the output device and runs a callback-driven stream that pulls
//! mixed stereo from the [`Mixer`]. `cpal::Stream` is not `Send`, so an
//! `AudioOutput` must live on the thread that created it.

use crate::audio::mixer::Mixer;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device (None = default)
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let requested = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name)),
            None => None,
        };

        let device = match (requested, device_name) {
            (Some(device), Some(name)) => {
                info!("Found requested audio device: {}", name);
                device
            }
            (_, requested_name) => {
                if let Some(name) = requested_name {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
                host.default_output_device().ok_or_else(|| {
                    Error::AudioOutput("No default output device found".to_string())
                })?
            }
        };

        let (config, sample_format) = Self::get_best_config(&device)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Prefer a stereo f32 config at the device's default rate
    fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let default = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let rate = default.sample_rate();

        let preferred = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .find(|c| {
                c.channels() == 2
                    && c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
            });

        if let Some(supported) = preferred {
            let format = supported.sample_format();
            return Ok((supported.with_sample_rate(rate).config(), format));
        }

        let format = default.sample_format();
        Ok((default.config(), format))
    }

    /// Start the stream, pulling audio from `mixer`
    pub fn start(&mut self, mixer: Arc<Mixer>) -> Result<()> {
        info!("Starting audio stream on {}", self.device_name());

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(mixer)?,
            SampleFormat::I16 => self.build_stream::<i16>(mixer)?,
            SampleFormat::U16 => self.build_stream::<u16>(mixer)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream<T>(&self, mixer: Arc<Mixer>) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    scratch.resize(frames * 2, 0.0);
                    mixer.fill(&mut scratch);

                    for (frame, stereo) in data.chunks_mut(channels).zip(scratch.chunks_exact(2)) {
                        if channels == 1 {
                            frame[0] = T::from_sample((stereo[0] + stereo[1]) * 0.5);
                            continue;
                        }
                        for (ch, out) in frame.iter_mut().enumerate() {
                            let value = stereo.get(ch).copied().unwrap_or(0.0);
                            *out = T::from_sample(value);
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Flag shared with the stream error callback
    pub fn error_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.error_flag)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}
