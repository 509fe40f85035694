//! # Soundboard Playback Engine (soundboard-engine)
//!
//! Unified audio playback for a soundboard: one device, at most one current
//! track, time-stepped fades and crossfades, finite/infinite looping and a
//! typed event stream for decoupled UI widgets.
//!
//! **Architecture:** [`AudioEngine`] composes a [`FadeScheduler`], a
//! [`LoopController`] and a [`StopListenerRegistry`] over a pluggable
//! [`PlaybackBackend`]. Time only moves through [`AudioEngine::tick`],
//! driven by [`spawn_update_loop`] in production and by a
//! [`ManualClock`] in tests.

pub mod audio;
pub mod backend;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fader;
pub mod looping;
pub mod stop_listeners;
pub mod usage;

pub use backend::{CpalBackend, PlaybackBackend, PlaybackSource, SourceRequest, VirtualBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendKind, Config};
pub use engine::{spawn_update_loop, AudioEngine, AudioState, EngineBuilder, UpdateLoop};
pub use error::{Error, Error as EngineError, Result};
pub use fader::{FadeScheduler, RampPurpose, SourceSlot};
pub use looping::{LoopController, LoopDecision};
pub use stop_listeners::StopListenerRegistry;
pub use usage::{InMemoryTrackStore, TrackStore, UsageTracker};

pub use soundboard_common::{
    AudioSettings, AudioSettingsPatch, EngineState, EventKind, FadeCurve, FadeDirection, ListenerId,
    LoopSettings, PlaybackErrorKind, SoundboardEvent, Track, Volume,
};
