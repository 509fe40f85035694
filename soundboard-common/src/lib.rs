//! # Soundboard Common Library
//!
//! Shared code for the soundboard playback engine and its consumers:
//! - Track and audio settings models
//! - Event types (SoundboardEvent enum) and the EventBus
//! - Configuration file resolution
//! - Fade curve definitions and calculations
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod settings;
pub mod time;
pub mod track;

pub use error::{Error, Result};
pub use events::{
    EngineState, EventBus, EventKind, FadeDirection, ListenerId, PlaybackErrorKind,
    SoundboardEvent,
};
pub use fade_curves::FadeCurve;
pub use settings::{AudioSettings, AudioSettingsPatch, LoopSettings, Volume};
pub use track::Track;
