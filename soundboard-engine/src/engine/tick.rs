//! Clock-driven housekeeping
//!
//! [`AudioEngine::tick`] is the only place where time moves the engine
//! forward: ramp steps are applied to the device, completed fades take
//! their follow-up action, natural track ends go through the loop
//! controller, and `timeUpdate` events are paced.

use std::time::Duration;

use soundboard_common::events::FadeDirection;
use soundboard_common::time::now;
use soundboard_common::{EngineState, SoundboardEvent, Volume};
use tracing::{debug, info, warn};

use super::core::{AudioEngine, Effects, EngineInner};
use crate::fader::{RampPurpose, RampTick, SourceSlot};
use crate::looping::LoopDecision;

impl AudioEngine {
    /// Advance ramps, detect track ends and emit due time updates
    ///
    /// Called periodically by the update loop; tests call it directly after
    /// moving a manual clock.
    pub fn tick(&self) {
        let mut effects = Effects::default();
        {
            let mut inner = self.lock();
            let at = self.clock.now();
            self.apply_ramps(&mut inner, at, &mut effects);
            self.check_track_end(&mut inner, &mut effects);
            self.emit_time_update(&mut inner, at, &mut effects);
        }
        self.dispatch(effects);
    }

    fn apply_ramps(&self, inner: &mut EngineInner, at: Duration, effects: &mut Effects) {
        for tick in inner.fader.advance(at) {
            apply_volume(inner, &tick);
            if tick.completed {
                on_ramp_complete(inner, &tick, effects);
            }
        }
    }

    fn check_track_end(&self, inner: &mut EngineInner, effects: &mut Effects) {
        if inner.state != EngineState::Playing || inner.transition.is_some() {
            return;
        }
        let ended = inner
            .primary
            .as_mut()
            .map(|source| source.take_ended())
            .unwrap_or(false);
        if !ended {
            return;
        }

        match inner.looping.on_track_end() {
            LoopDecision::Restart => {
                let track_id = inner.current_track_id();
                let Some(source) = inner.primary.as_mut() else {
                    return;
                };
                source.seek(0.0);
                if let Err(err) = source.resume() {
                    warn!("Device refused loop restart: {}", err);
                    inner.fail_locked(track_id.as_deref(), &err, effects);
                    return;
                }
                inner.last_time_update = None;
                debug!(
                    "Loop restart {} for track {}",
                    inner.looping.current_loop_count(),
                    track_id.as_deref().unwrap_or("?")
                );
            }
            LoopDecision::Finish { loops_played } => {
                inner.fader.cancel_all();
                let volume = inner.settings.volume.as_unit();
                if let Some(source) = inner.primary.as_mut() {
                    source.set_volume(volume);
                }
                inner.set_state(EngineState::Idle, effects);

                if let Some(track) = inner.current_track.clone() {
                    info!("Track {} ended after {} loop(s)", track.id, loops_played);
                    effects.emit(SoundboardEvent::TrackEnd {
                        track,
                        loops_played,
                        timestamp: now(),
                    });
                }
            }
        }
    }

    fn emit_time_update(&self, inner: &mut EngineInner, at: Duration, effects: &mut Effects) {
        if inner.state != EngineState::Playing {
            return;
        }
        let due = match inner.last_time_update {
            Some(last) => at.saturating_sub(last) >= self.time_update_interval,
            None => true,
        };
        if !due {
            return;
        }
        let Some(track_id) = inner.current_track_id() else {
            return;
        };

        inner.last_time_update = Some(at);
        effects.emit(SoundboardEvent::TimeUpdate {
            track_id,
            current_time: inner.position(),
            duration: inner.duration(),
            timestamp: now(),
        });
    }
}

fn apply_volume(inner: &mut EngineInner, tick: &RampTick) {
    let source = match tick.slot {
        SourceSlot::Primary => inner.primary.as_mut(),
        SourceSlot::Transient => inner.transition.as_mut().map(|t| &mut t.source),
    };
    if let Some(source) = source {
        source.set_volume(tick.volume);
    }
}

fn on_ramp_complete(inner: &mut EngineInner, tick: &RampTick, effects: &mut Effects) {
    match tick.purpose {
        RampPurpose::FadeIn => {
            // Land on the configured volume even if it changed mid-ramp
            let volume = inner.settings.volume;
            if let Some(source) = inner.primary.as_mut() {
                source.set_volume(volume.as_unit());
            }
            let track_id = inner.current_track_id();
            effects.emit(SoundboardEvent::FadeComplete {
                direction: FadeDirection::In,
                track_id,
                volume,
                timestamp: now(),
            });
        }
        RampPurpose::FadeOutPause => {
            let track_id = inner.current_track_id();
            effects.emit(SoundboardEvent::FadeComplete {
                direction: FadeDirection::Out,
                track_id,
                volume: Volume::from_unit(tick.volume),
                timestamp: now(),
            });
            inner.pause_locked(effects);
        }
        RampPurpose::FadeOutStop => {
            let track_id = inner.current_track_id();
            effects.emit(SoundboardEvent::FadeComplete {
                direction: FadeDirection::Out,
                track_id,
                volume: Volume::from_unit(tick.volume),
                timestamp: now(),
            });
            inner.stop_locked(effects);
        }
        // The outgoing side is released when the incoming ramp commits
        RampPurpose::CrossfadeOut => {}
        RampPurpose::CrossfadeIn => inner.commit_transition(effects),
    }
}
