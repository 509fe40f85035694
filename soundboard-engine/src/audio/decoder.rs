//! Audio decoder using symphonia
//!
//! Decodes MP3, FLAC, AAC, Vorbis and WAV files to interleaved stereo f32.
//! Soundboard clips are short, so files are decoded whole before playback.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Fully decoded clip
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved stereo samples [L, R, L, R, ...]
    pub samples: Vec<f32>,
    /// Source sample rate (before resampling)
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

pub struct SimpleDecoder;

impl SimpleDecoder {
    fn open_format(path: &Path) -> Result<Box<dyn FormatReader>> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;
        Ok(probed.format)
    }

    /// Duration from container metadata, without decoding
    ///
    /// `None` when the container does not record a frame count.
    pub fn probe_duration(path: &Path) -> Result<Option<f64>> {
        let format = Self::open_format(path)?;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let params = &track.codec_params;
        let duration = match (params.n_frames, params.sample_rate) {
            (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
            _ => None,
        };
        Ok(duration)
    }

    /// Decode an entire audio file to stereo PCM
    ///
    /// Mono is duplicated to both channels; anything wider than stereo keeps
    /// its first two channels. Corrupt packets are skipped with a warning.
    pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding entire file: {}", path.display());

        let mut format = Self::open_format(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decoder failed: {}", e))),
            };

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if scratch.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            push_stereo(buf.samples(), spec.channels.count(), &mut samples);
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!(
                "No audio decoded from {}",
                path.display()
            )));
        }

        debug!(
            "Decoded {} frames at {}Hz from {}",
            samples.len() / 2,
            sample_rate,
            path.display()
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
        })
    }
}

/// Append interleaved samples with `channels` channels as stereo
fn push_stereo(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            output.reserve(interleaved.len() * 2);
            for &s in interleaved {
                output.push(s);
                output.push(s);
            }
        }
        2 => output.extend_from_slice(interleaved),
        n => {
            output.reserve(interleaved.len() / n * 2);
            for frame in interleaved.chunks_exact(n) {
                output.push(frame[0]);
                output.push(frame[1]);
            }
        }
    }
}
