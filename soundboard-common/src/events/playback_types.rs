//! Playback-related type definitions
//!
//! Supporting types carried by soundboard events.

use serde::{Deserialize, Serialize};

/// Engine state machine
///
/// `Idle → Loading → Playing ⇄ Paused → Idle`, or `Playing → Idle` on a
/// natural end that does not loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No track loaded, or the last one finished/failed
    #[default]
    Idle,
    /// Source opened, waiting for the device to start
    Loading,
    Playing,
    Paused,
}

impl EngineState {
    pub fn is_playing(&self) -> bool {
        matches!(self, EngineState::Playing)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Loading => write!(f, "loading"),
            EngineState::Playing => write!(f, "playing"),
            EngineState::Paused => write!(f, "paused"),
        }
    }
}

/// Error categories reported through `error` events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackErrorKind {
    /// Track has no resolvable audio source
    SourceError,
    /// Host policy refused to start playback
    DeviceRejected,
    /// Source exists but could not be decoded
    DecodeError,
    /// Output device failed or disappeared
    OutputError,
}

impl std::fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackErrorKind::SourceError => write!(f, "SourceError"),
            PlaybackErrorKind::DeviceRejected => write!(f, "DeviceRejected"),
            PlaybackErrorKind::DecodeError => write!(f, "DecodeError"),
            PlaybackErrorKind::OutputError => write!(f, "OutputError"),
        }
    }
}

/// What a volume ramp is doing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FadeDirection {
    In,
    Out,
    Crossfade,
}

impl std::fmt::Display for FadeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FadeDirection::In => write!(f, "in"),
            FadeDirection::Out => write!(f, "out"),
            FadeDirection::Crossfade => write!(f, "crossfade"),
        }
    }
}
