//! Playback control - play, crossfade, pause/resume, stop, seek, fades
//!
//! `play_track` is the only asynchronous operation. It never holds the
//! engine lock across the device's start future: the lock is released,
//! the future awaited, and the outcome applied only if no later play or
//! stop has superseded it (generation check).

use futures::future::BoxFuture;
use soundboard_common::events::FadeDirection;
use soundboard_common::time::now;
use soundboard_common::{EngineState, SoundboardEvent, Track};
use tracing::{debug, info, warn};

use super::core::{AudioEngine, EngineInner, Effects, Transition};
use crate::backend::{PlaybackSource, SourceRequest};
use crate::error::{Error, Result};
use crate::fader::{RampPurpose, RampStart, SourceSlot};

impl AudioEngine {
    /// Make `track` the current track and start it
    ///
    /// Resolves once the device has started playback. With `crossfade` set
    /// and a track already Playing (and a non-zero crossfade duration), the
    /// new track fades in over the old one and becomes current when the
    /// crossfade completes. Otherwise the current track is stopped at once
    /// and its stop listener fires before the new track starts.
    ///
    /// # Errors
    /// - [`Error::Source`] when the track has no playable source
    /// - [`Error::DeviceRejected`] when the host refuses to start playback
    ///
    /// Either way an `error` event is emitted and the engine is Idle.
    ///
    /// - [`Error::Superseded`] when a later play or stop took over while
    ///   this track was still starting; no event is emitted
    ///
    /// A track that never started has its stop listener dropped uncalled.
    pub async fn play_track(&self, track: Track, crossfade: bool) -> Result<()> {
        let source = match track.resolved_source() {
            Some(url) => self.backend.open(&SourceRequest {
                track_id: &track.id,
                url,
                duration_hint: track.duration,
            }),
            None => Err(Error::source_error(&track.id, "track has no audio source")),
        };

        let source = match source {
            Ok(source) => source,
            Err(err) => {
                warn!("Cannot play track {}: {}", track.id, err);
                let mut effects = Effects::default();
                {
                    let mut inner = self.lock();
                    inner.fail_locked(Some(&track.id), &err, &mut effects);
                    self.forget_listener(&inner, &track.id, &effects);
                }
                self.dispatch(effects);
                return Err(err);
            }
        };

        let mut effects = Effects::default();
        let (generation, started, previous, crossfading) = {
            let mut inner = self.lock();
            let crossfading = crossfade && inner.can_crossfade();
            let previous = inner.current_track_id();
            let started = if crossfading {
                self.begin_crossfade(&mut inner, track.clone(), source, &mut effects)
            } else {
                self.begin_hard_cut(&mut inner, track.clone(), source, &mut effects)
            };
            (inner.generation, started, previous, crossfading)
        };
        self.dispatch(effects);

        let outcome = started.await;

        let mut effects = Effects::default();
        let result = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!("Start of track {} superseded", track.id);
                self.forget_listener(&inner, &track.id, &effects);
                return Err(Error::Superseded { track_id: track.id });
            }
            match outcome {
                Ok(()) if crossfading => Ok(()),
                Ok(()) => {
                    self.finish_hard_cut(&mut inner, previous, &mut effects);
                    Ok(())
                }
                Err(err) => {
                    warn!("Device refused to start track {}: {}", track.id, err);
                    // The refused track never played: drop it without notifying its listener
                    if crossfading {
                        inner.transition = None;
                    } else {
                        inner.current_track = None;
                    }
                    inner.fail_locked(Some(&track.id), &err, &mut effects);
                    self.forget_listener(&inner, &track.id, &effects);
                    Err(err)
                }
            }
        };
        self.dispatch(effects);
        result
    }

    fn begin_hard_cut(
        &self,
        inner: &mut EngineInner,
        track: Track,
        mut source: Box<dyn PlaybackSource>,
        effects: &mut Effects,
    ) -> BoxFuture<'static, Result<()>> {
        inner.generation = inner.generation.wrapping_add(1);
        inner.release_sources(effects);
        inner.looping.reset();

        let initial = if inner.settings.fade_in_duration > 0.0 {
            0.0
        } else {
            inner.settings.volume.as_unit()
        };
        source.set_volume(initial);
        let started = source.play();

        info!("Loading track {} ({})", track.id, track.title);
        inner.primary = Some(source);
        inner.current_track = Some(track);
        inner.set_state(EngineState::Loading, effects);
        started
    }

    fn begin_crossfade(
        &self,
        inner: &mut EngineInner,
        track: Track,
        mut source: Box<dyn PlaybackSource>,
        effects: &mut Effects,
    ) -> BoxFuture<'static, Result<()>> {
        inner.generation = inner.generation.wrapping_add(1);
        let now = self.clock.now();
        let duration = inner.settings.crossfade_duration;
        let curve = inner.settings.fade_curve;
        let target = inner.settings.volume.as_unit();

        let outgoing = inner
            .fader
            .cancel(SourceSlot::Primary, now)
            .or_else(|| inner.primary.as_ref().map(|s| s.volume()))
            .unwrap_or(target);

        inner.fader.start(
            SourceSlot::Primary,
            outgoing,
            0.0,
            duration,
            curve,
            RampPurpose::CrossfadeOut,
            now,
        );
        inner.fader.start(
            SourceSlot::Transient,
            0.0,
            target,
            duration,
            curve,
            RampPurpose::CrossfadeIn,
            now,
        );

        source.set_volume(0.0);
        let started = source.play();

        info!("Crossfading to track {} over {:.2}s", track.id, duration);
        effects.emit(inner.fade_start_event(
            FadeDirection::Crossfade,
            Some(track.id.clone()),
            0.0,
            target,
            duration,
        ));
        inner.transition = Some(Transition { track, source });
        started
    }

    /// Loading → Playing: start the fade-in and announce the new track
    fn finish_hard_cut(
        &self,
        inner: &mut EngineInner,
        previous: Option<String>,
        effects: &mut Effects,
    ) {
        let Some(track) = inner.current_track.clone() else {
            return;
        };

        let fade_in = inner.settings.fade_in_duration;
        if fade_in > 0.0 {
            let target = inner.settings.volume.as_unit();
            let curve = inner.settings.fade_curve;
            inner.fader.start(
                SourceSlot::Primary,
                0.0,
                target,
                fade_in,
                curve,
                RampPurpose::FadeIn,
                self.clock.now(),
            );
            effects.emit(inner.fade_start_event(
                FadeDirection::In,
                Some(track.id.clone()),
                0.0,
                target,
                fade_in,
            ));
        }

        effects.emit(SoundboardEvent::TrackChange {
            track: track.clone(),
            previous_track_id: previous,
            crossfade: false,
            timestamp: now(),
        });
        inner.set_state(EngineState::Playing, effects);
        info!("Playing track {} ({})", track.id, track.title);
    }

    /// Pause playback; no-op unless Playing
    ///
    /// A running crossfade is committed first. Any ramp on the primary
    /// source is cancelled and the configured volume restored.
    pub fn pause(&self) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            if inner.state != EngineState::Playing {
                return;
            }
            if inner.transition.is_some() {
                inner.commit_transition(&mut effects);
            }
            inner.pause_locked(&mut effects);
        }
        self.dispatch(effects);
    }

    /// Continue after a pause
    ///
    /// From Idle with a finished track still loaded, the track restarts
    /// from the beginning. Otherwise a no-op unless Paused.
    pub fn resume(&self) -> Result<()> {
        let mut effects = Effects::default();
        let result = {
            let mut inner = self.lock();
            inner.resume_locked(&mut effects)
        };
        self.dispatch(effects);
        result
    }

    /// Stop playback and clear the current track
    ///
    /// Cancels fades and any crossfade, rewinds, fires the displaced
    /// track's stop listener once.
    pub fn stop(&self) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            inner.stop_locked(&mut effects);
        }
        self.dispatch(effects);
    }

    /// Fade out over the configured `fade_out_duration`, then stop
    pub fn stop_with_fade(&self) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            let duration = inner.settings.fade_out_duration;
            if inner.state != EngineState::Playing || duration <= 0.0 {
                inner.stop_locked(&mut effects);
            } else {
                if inner.transition.is_some() {
                    inner.commit_transition(&mut effects);
                }
                self.start_fade_out(&mut inner, duration, RampPurpose::FadeOutStop, &mut effects);
            }
        }
        self.dispatch(effects);
    }

    /// Move the playhead, clamped to `[0, duration]`; no-op without a track
    pub fn seek_to(&self, seconds: f64) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            let Some(track_id) = inner.current_track_id() else {
                return;
            };
            let duration = inner.duration();
            let target = if seconds.is_nan() {
                0.0
            } else if duration > 0.0 {
                seconds.clamp(0.0, duration)
            } else {
                seconds.max(0.0)
            };

            let Some(source) = inner.primary.as_mut() else {
                return;
            };
            source.seek(target);
            debug!("Seeked track {} to {:.2}s", track_id, target);

            inner.last_time_update = Some(self.clock.now());
            effects.emit(SoundboardEvent::TimeUpdate {
                track_id,
                current_time: target,
                duration,
                timestamp: now(),
            });
        }
        self.dispatch(effects);
    }

    /// Ramp the primary source from 0 to the configured volume
    ///
    /// A duration ≤ 0 sets the configured volume at once (no ramp), exactly
    /// like `set_volume(volume())`.
    pub fn fade_in(&self, seconds: f64) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            let now = self.clock.now();
            let target = inner.settings.volume.as_unit();

            if seconds.is_nan() || seconds <= 0.0 {
                inner.fader.cancel(SourceSlot::Primary, now);
                let volume = inner.settings.volume;
                inner.set_volume_locked(volume, &mut effects);
            } else if inner.primary.is_some() && inner.transition.is_none() {
                let curve = inner.settings.fade_curve;
                let start = inner.fader.start(
                    SourceSlot::Primary,
                    0.0,
                    target,
                    seconds,
                    curve,
                    RampPurpose::FadeIn,
                    now,
                );
                if let Some(source) = inner.primary.as_mut() {
                    source.set_volume(match start {
                        RampStart::Immediate(v) => v,
                        RampStart::Started { .. } => 0.0,
                    });
                }
                let track_id = inner.current_track_id();
                effects.emit(inner.fade_start_event(
                    FadeDirection::In,
                    track_id,
                    0.0,
                    target,
                    seconds,
                ));
            }
        }
        self.dispatch(effects);
    }

    /// Ramp the primary source to silence, then pause
    ///
    /// When the ramp completes the device is paused and its volume restored
    /// to the configured setting for the next play. A duration ≤ 0 pauses
    /// immediately.
    pub fn fade_out(&self, seconds: f64) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            if inner.state != EngineState::Playing {
                return;
            }
            if inner.transition.is_some() {
                inner.commit_transition(&mut effects);
            }
            if seconds > 0.0 {
                self.start_fade_out(&mut inner, seconds, RampPurpose::FadeOutPause, &mut effects);
            } else {
                inner.pause_locked(&mut effects);
            }
        }
        self.dispatch(effects);
    }

    fn start_fade_out(
        &self,
        inner: &mut EngineInner,
        seconds: f64,
        purpose: RampPurpose,
        effects: &mut Effects,
    ) {
        let now = self.clock.now();
        let from = inner
            .fader
            .cancel(SourceSlot::Primary, now)
            .or_else(|| inner.primary.as_ref().map(|s| s.volume()))
            .unwrap_or(0.0);
        let curve = inner.settings.fade_curve;

        inner
            .fader
            .start(SourceSlot::Primary, from, 0.0, seconds, curve, purpose, now);
        if let Some(source) = inner.primary.as_mut() {
            source.set_volume(from);
        }
        let track_id = inner.current_track_id();
        effects.emit(inner.fade_start_event(FadeDirection::Out, track_id, from, 0.0, seconds));
    }
}

impl EngineInner {
    /// Crossfade only from a steady Playing state with a positive window
    fn can_crossfade(&self) -> bool {
        self.state == EngineState::Playing
            && self.primary.is_some()
            && self.transition.is_none()
            && self.settings.crossfade_duration > 0.0
    }

    /// Hand the device to the incoming crossfade source
    pub(super) fn commit_transition(&mut self, effects: &mut Effects) {
        let Some(Transition { track, mut source }) = self.transition.take() else {
            return;
        };

        self.fader.cancel_all();
        source.set_volume(self.settings.volume.as_unit());
        if let Some(mut outgoing) = self.primary.replace(source) {
            outgoing.pause();
        }

        let previous = self.current_track.replace(track.clone());
        if let Some(previous) = previous.as_ref() {
            effects.displace(&previous.id);
        }
        self.looping.reset();
        self.last_time_update = None;

        info!("Crossfade committed to track {}", track.id);
        effects.emit(SoundboardEvent::FadeComplete {
            direction: FadeDirection::Crossfade,
            track_id: Some(track.id.clone()),
            volume: self.settings.volume,
            timestamp: now(),
        });
        effects.emit(SoundboardEvent::TrackChange {
            track,
            previous_track_id: previous.map(|t| t.id),
            crossfade: true,
            timestamp: now(),
        });
    }

    /// Pause the primary source with the configured volume restored
    pub(super) fn pause_locked(&mut self, effects: &mut Effects) {
        self.fader.cancel_all();
        let volume = self.settings.volume.as_unit();
        if let Some(source) = self.primary.as_mut() {
            source.pause();
            source.set_volume(volume);
        }
        self.set_state(EngineState::Paused, effects);
    }

    fn resume_locked(&mut self, effects: &mut Effects) -> Result<()> {
        let restart = match self.state {
            EngineState::Paused => false,
            EngineState::Idle if self.primary.is_some() && self.current_track.is_some() => true,
            _ => return Ok(()),
        };

        let volume = self.settings.volume.as_unit();
        let track_id = self.current_track_id();
        let Some(source) = self.primary.as_mut() else {
            return Ok(());
        };
        if restart {
            source.seek(0.0);
            source.set_volume(volume);
        }

        match source.resume() {
            Ok(()) => {
                if restart {
                    self.looping.reset();
                }
                self.last_time_update = None;
                self.set_state(EngineState::Playing, effects);
                Ok(())
            }
            Err(err) => {
                warn!("Device refused to resume: {}", err);
                self.fail_locked(track_id.as_deref(), &err, effects);
                Err(err)
            }
        }
    }
}
