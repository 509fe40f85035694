//! Audio pipeline for the cpal backend
//!
//! decode (symphonia) → resample to device rate (rubato) → mix voices → cpal stream

pub mod decoder;
pub mod mixer;
pub mod output;
pub mod resampler;

pub use decoder::{DecodedAudio, SimpleDecoder};
pub use mixer::{Mixer, Voice};
pub use output::AudioOutput;
pub use resampler::Resampler;
