//! Core engine - construction, shared state and the synchronous API
//!
//! **Responsibilities:**
//! - AudioEngine struct definition and construction (EngineBuilder)
//! - Volume, loop, settings and listener management
//! - State snapshots and diagnostics
//! - Helpers shared by the playback and tick modules
//!
//! All mutable state sits behind one mutex. Operations collect the events
//! and stop notifications they cause into [`Effects`] while holding the lock,
//! then dispatch them after releasing it, so subscribers and stop listeners
//! can call back into the engine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use soundboard_common::events::FadeDirection;
use soundboard_common::time::now;
use soundboard_common::{
    AudioSettings, AudioSettingsPatch, EngineState, EventBus, EventKind, ListenerId, LoopSettings,
    SoundboardEvent, Track, Volume,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::state::AudioState;
use crate::backend::{PlaybackBackend, PlaybackSource, VirtualBackend};
use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::fader::{FadeScheduler, SourceSlot, DEFAULT_FADE_STEPS};
use crate::looping::LoopController;
use crate::stop_listeners::StopListenerRegistry;

/// Default period between `timeUpdate` events while playing
pub const DEFAULT_TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Default broadcast buffer for async event subscribers
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Incoming track while a crossfade runs
pub(super) struct Transition {
    pub(super) track: Track,
    pub(super) source: Box<dyn PlaybackSource>,
}

pub(super) struct EngineInner {
    pub(super) state: EngineState,
    pub(super) settings: AudioSettings,
    pub(super) current_track: Option<Track>,
    pub(super) primary: Option<Box<dyn PlaybackSource>>,
    pub(super) transition: Option<Transition>,
    pub(super) fader: FadeScheduler,
    pub(super) looping: LoopController,
    /// Bumped by every play/stop; a pending start whose generation no
    /// longer matches has been superseded
    pub(super) generation: u64,
    pub(super) last_time_update: Option<Duration>,
}

/// Side effects gathered under the lock and run after it is released
#[derive(Default)]
pub(super) struct Effects {
    /// Track ids whose stop listener must fire, in order
    pub(super) displaced: Vec<String>,
    pub(super) events: Vec<SoundboardEvent>,
}

impl Effects {
    pub(super) fn emit(&mut self, event: SoundboardEvent) {
        self.events.push(event);
    }

    pub(super) fn displace(&mut self, track_id: &str) {
        if !self.displaced.iter().any(|id| id == track_id) {
            self.displaced.push(track_id.to_string());
        }
    }
}

/// Unified soundboard playback engine
///
/// Owns the single playback device (one primary source plus at most one
/// transient crossfade source) and guarantees at most one current track.
/// Build with [`EngineBuilder`]; share as `Arc<AudioEngine>`.
pub struct AudioEngine {
    pub(super) inner: Mutex<EngineInner>,
    pub(super) backend: Arc<dyn PlaybackBackend>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) bus: Arc<EventBus>,
    pub(super) stop_listeners: StopListenerRegistry,
    pub(super) time_update_interval: Duration,
}

impl AudioEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run collected effects: stop listeners first, then events
    pub(super) fn dispatch(&self, effects: Effects) {
        for track_id in effects.displaced {
            self.stop_listeners.notify(&track_id);
        }
        for event in effects.events {
            self.bus.emit(event);
        }
    }

    /// Drop the stop listener of a track that never started playing
    ///
    /// Kept when the id is still current (a newer play of the same track)
    /// or is about to be notified by `effects`.
    pub(super) fn forget_listener(&self, inner: &EngineInner, track_id: &str, effects: &Effects) {
        let still_owned = inner.current_track_id().as_deref() == Some(track_id)
            || inner.transition.as_ref().map(|t| t.track.id.as_str()) == Some(track_id)
            || effects.displaced.iter().any(|id| id == track_id);
        if !still_owned && self.stop_listeners.unregister(track_id) {
            debug!("Dropped stop listener of unstarted track {}", track_id);
        }
    }

    // ---------------------------------------------------------------
    // Volume
    // ---------------------------------------------------------------

    /// Set the configured volume on the 0-100 scale (clamped)
    ///
    /// Applied to the device immediately unless a ramp currently owns the
    /// primary source. A running fade-in lands on the new value when it
    /// completes.
    pub fn set_volume(&self, percent: f32) {
        let volume = Volume::from_percent(percent);
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            inner.set_volume_locked(volume, &mut effects);
        }
        self.dispatch(effects);
    }

    /// Configured volume on the 0-100 scale
    pub fn volume(&self) -> f32 {
        self.lock().settings.volume.as_percent()
    }

    // ---------------------------------------------------------------
    // Looping
    // ---------------------------------------------------------------

    /// Configure looping; `count` is additional replays, negative = infinite
    pub fn set_looping(&self, enabled: bool, count: i32) {
        let mut inner = self.lock();
        inner.looping.configure(enabled, count);
        let settings = inner.looping.settings();
        inner.settings.loop_enabled = settings.enabled;
        inner.settings.loop_count = settings.count;
        debug!("Looping set: enabled={}, count={}", settings.enabled, settings.count);
    }

    pub fn loop_settings(&self) -> LoopSettings {
        self.lock().looping.settings()
    }

    // ---------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------

    pub fn settings(&self) -> AudioSettings {
        self.lock().settings.clone()
    }

    /// Apply a partial settings update
    ///
    /// A volume change behaves like [`set_volume`](Self::set_volume); loop
    /// changes reconfigure the loop controller.
    pub fn apply_settings(&self, patch: AudioSettingsPatch) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            let volume = patch.volume;
            let loops_changed = patch.loop_enabled.is_some() || patch.loop_count.is_some();

            inner.settings.apply(&AudioSettingsPatch { volume: None, ..patch });
            if let Some(volume) = volume {
                inner.set_volume_locked(volume, &mut effects);
            }
            if loops_changed {
                let (enabled, count) = (inner.settings.loop_enabled, inner.settings.loop_count);
                inner.looping.configure(enabled, count);
            }
        }
        self.dispatch(effects);
    }

    // ---------------------------------------------------------------
    // Events and listeners
    // ---------------------------------------------------------------

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SoundboardEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    /// Receive every event on an async channel
    pub fn subscribe(&self) -> broadcast::Receiver<SoundboardEvent> {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// One-shot callback fired when `track_id` is displaced (replaces any existing one)
    pub fn register_stop_listener<F>(&self, track_id: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop_listeners.register(track_id, callback);
    }

    pub fn unregister_stop_listener(&self, track_id: &str) -> bool {
        self.stop_listeners.unregister(track_id)
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    /// Synchronous snapshot, no side effects
    pub fn current_state(&self) -> AudioState {
        let inner = self.lock();
        AudioState {
            current_track: inner.current_track.clone(),
            is_playing: inner.state.is_playing(),
            current_time: inner.position(),
            duration: inner.duration(),
            is_looping: inner.looping.is_enabled(),
            loop_count: inner.looping.current_loop_count(),
            state: inner.state,
            volume: inner.settings.volume.as_percent(),
        }
    }

    pub fn current_track(&self) -> Option<Track> {
        self.lock().current_track.clone()
    }

    pub fn is_track_playing(&self) -> bool {
        self.lock().state.is_playing()
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    // ---------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------

    /// Volume ramps currently scheduled (0, 1 or 2)
    pub fn active_ramps(&self) -> usize {
        self.lock().fader.active_count()
    }

    pub fn has_transition(&self) -> bool {
        self.lock().transition.is_some()
    }

    pub fn stop_listener_count(&self) -> usize {
        self.stop_listeners.len()
    }

    /// Volume currently applied to the primary source (0-1)
    pub fn device_volume(&self) -> Option<f32> {
        self.lock().primary.as_ref().map(|source| source.volume())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("AudioEngine")
            .field("backend", &self.backend.name())
            .field("state", &inner.state)
            .field("current_track", &inner.current_track.as_ref().map(|t| &t.id))
            .field("transition", &inner.transition.as_ref().map(|t| &t.track.id))
            .finish()
    }
}

impl EngineInner {
    pub(super) fn position(&self) -> f64 {
        self.primary.as_ref().map(|s| s.position()).unwrap_or(0.0)
    }

    /// Device length when known, else the stored track duration
    pub(super) fn duration(&self) -> f64 {
        self.primary
            .as_ref()
            .and_then(|s| s.duration())
            .or_else(|| self.current_track.as_ref().map(|t| t.duration))
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }

    pub(super) fn current_track_id(&self) -> Option<String> {
        self.current_track.as_ref().map(|t| t.id.clone())
    }

    pub(super) fn set_state(&mut self, state: EngineState, effects: &mut Effects) {
        if self.state == state {
            return;
        }
        debug!("Engine state {} -> {}", self.state, state);
        self.state = state;
        effects.emit(SoundboardEvent::PlayStateChange {
            state,
            is_playing: state.is_playing(),
            track_id: self.current_track_id(),
            timestamp: now(),
        });
    }

    pub(super) fn set_volume_locked(&mut self, volume: Volume, effects: &mut Effects) {
        self.settings.volume = volume;
        let ramp_owns_device =
            self.fader.is_active(SourceSlot::Primary) || self.transition.is_some();
        if !ramp_owns_device {
            if let Some(source) = self.primary.as_mut() {
                source.set_volume(volume.as_unit());
            }
        }
        effects.emit(SoundboardEvent::VolumeChange {
            volume,
            timestamp: now(),
        });
    }

    /// Tear down every source and ramp; the current track and its
    /// crossfade partner (if any) are reported as displaced
    ///
    /// A track still Loading never started, so its listener is left alone.
    pub(super) fn release_sources(&mut self, effects: &mut Effects) {
        let started = self.state != EngineState::Loading;
        self.fader.cancel_all();
        if let Some(mut transition) = self.transition.take() {
            transition.source.pause();
            effects.displace(&transition.track.id);
        }
        if let Some(mut primary) = self.primary.take() {
            primary.pause();
            primary.seek(0.0);
        }
        if let Some(track) = self.current_track.take() {
            if started {
                effects.displace(&track.id);
            }
        }
        self.last_time_update = None;
    }

    /// Hard stop: release everything and go Idle
    pub(super) fn stop_locked(&mut self, effects: &mut Effects) {
        self.generation = self.generation.wrapping_add(1);
        let had_track = self.current_track.is_some();
        self.release_sources(effects);
        self.looping.reset();
        if had_track {
            info!("Playback stopped");
        }
        self.set_state(EngineState::Idle, effects);
    }

    /// Report a failure, release the device and return to Idle
    pub(super) fn fail_locked(
        &mut self,
        track_id: Option<&str>,
        err: &Error,
        effects: &mut Effects,
    ) {
        effects.emit(SoundboardEvent::Error {
            kind: err.kind(),
            track_id: track_id.map(str::to_string),
            message: err.to_string(),
            timestamp: now(),
        });
        self.stop_locked(effects);
    }

    pub(super) fn fade_start_event(
        &self,
        direction: FadeDirection,
        track_id: Option<String>,
        from: f32,
        to: f32,
        duration: f64,
    ) -> SoundboardEvent {
        SoundboardEvent::FadeStart {
            direction,
            track_id,
            from: Volume::from_unit(from),
            to: Volume::from_unit(to),
            duration,
            timestamp: now(),
        }
    }
}

/// Builder for [`AudioEngine`]
///
/// Defaults: system clock, virtual backend on that clock, default settings,
/// 60 fade steps, 256-event broadcast buffer, 250ms time updates.
pub struct EngineBuilder {
    backend: Option<Arc<dyn PlaybackBackend>>,
    clock: Option<Arc<dyn Clock>>,
    settings: AudioSettings,
    fade_steps: u32,
    event_capacity: usize,
    time_update_interval: Duration,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            clock: None,
            settings: AudioSettings::default(),
            fade_steps: DEFAULT_FADE_STEPS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            time_update_interval: DEFAULT_TIME_UPDATE_INTERVAL,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn PlaybackBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: AudioSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn fade_steps(mut self, steps: u32) -> Self {
        self.fade_steps = steps;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn time_update_interval(mut self, interval: Duration) -> Self {
        self.time_update_interval = interval;
        self
    }

    pub fn build(self) -> AudioEngine {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(VirtualBackend::new(Arc::clone(&clock))));

        info!(
            "Audio engine created (backend={}, volume={:.0}%)",
            backend.name(),
            self.settings.volume.as_percent()
        );

        let looping = LoopController::new(self.settings.loop_enabled, self.settings.loop_count);
        AudioEngine {
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                settings: self.settings,
                current_track: None,
                primary: None,
                transition: None,
                fader: FadeScheduler::new(self.fade_steps),
                looping,
                generation: 0,
                last_time_update: None,
            }),
            backend,
            clock,
            bus: Arc::new(EventBus::new(self.event_capacity)),
            stop_listeners: StopListenerRegistry::new(),
            time_update_interval: self.time_update_interval,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
