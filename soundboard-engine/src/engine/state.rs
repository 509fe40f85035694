//! Read-only engine snapshot

use serde::{Deserialize, Serialize};
use soundboard_common::{EngineState, Track};

/// Snapshot returned by `AudioEngine::current_state`
///
/// Derived on demand; holding one has no effect on the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// Seconds into the current track
    pub current_time: f64,
    /// Seconds; device-reported when available, else the stored track duration
    pub duration: f64,
    pub is_looping: bool,
    /// Replays performed so far for the current track
    pub loop_count: u32,
    pub state: EngineState,
    /// Configured volume, 0-100
    pub volume: f32,
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            is_looping: false,
            loop_count: 0,
            state: EngineState::Idle,
            volume: 0.0,
        }
    }
}
