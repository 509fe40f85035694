//! Playback engine
//!
//! **Module structure:**
//! - core: AudioEngine struct, construction, volume/loop/settings/listener API
//! - playback: play_track, crossfade, pause/resume, stop, seek, fades
//! - tick: clock-driven ramp stepping, track-end handling, time updates
//! - update_loop: tokio task driving `tick`
//! - state: read-only snapshot type

mod core;
mod playback;
mod state;
mod tick;
mod update_loop;

pub use self::core::{
    AudioEngine, EngineBuilder, DEFAULT_EVENT_CAPACITY, DEFAULT_TIME_UPDATE_INTERVAL,
};
pub use state::AudioState;
pub use update_loop::{spawn_update_loop, UpdateLoop, DEFAULT_UPDATE_INTERVAL};
