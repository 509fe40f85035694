//! Time-stepped volume ramps
//!
//! A ramp moves a source's volume from a start value to a target over a
//! duration, in a fixed number of discrete steps (default 60). Ramps are
//! pure data: the engine's update loop calls [`FadeScheduler::advance`] with
//! the current clock reading and applies the returned volumes to the device.
//!
//! # Invariants
//!
//! - At most one ramp per [`SourceSlot`]. Starting a ramp on a busy slot
//!   cancels the old one first; its instantaneous value is handed back so the
//!   caller can leave the device exactly where the old ramp was.
//! - A duration ≤ 0 (or NaN) never creates a ramp: [`RampStart::Immediate`]
//!   tells the caller to set the target volume directly.
//! - Completed ramps are removed in the same `advance` call that reports
//!   completion, so nothing lingers after the target is reached.

use std::time::Duration;

use soundboard_common::time::secs_to_duration;
use soundboard_common::FadeCurve;

/// Default number of discrete volume steps per ramp
pub const DEFAULT_FADE_STEPS: u32 = 60;

/// Which audio source a ramp drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceSlot {
    /// The engine's main playback source
    Primary,
    /// Incoming source during a crossfade
    Transient,
}

/// Why a ramp was started; decides what happens when it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPurpose {
    FadeIn,
    /// Fade to silence, then pause with the configured volume restored
    FadeOutPause,
    /// Fade to silence, then stop
    FadeOutStop,
    CrossfadeOut,
    CrossfadeIn,
}

/// A single active ramp
#[derive(Debug, Clone, PartialEq)]
pub struct Ramp {
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
    pub steps: u32,
    pub started_at: Duration,
    pub curve: FadeCurve,
    pub purpose: RampPurpose,
    last_step: u32,
}

impl Ramp {
    /// Step index reached at `now`, capped at `steps`
    fn step_at(&self, now: Duration) -> u32 {
        let elapsed = now.saturating_sub(self.started_at);
        if elapsed >= self.duration {
            return self.steps;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        ((progress * self.steps as f64).floor() as u32).min(self.steps)
    }

    fn value_for_step(&self, step: u32) -> f32 {
        let t = step as f32 / self.steps as f32;
        self.curve.interpolate(self.from, self.to, t).clamp(0.0, 1.0)
    }

    /// Volume the ramp has reached at `now`
    pub fn value_at(&self, now: Duration) -> f32 {
        self.value_for_step(self.step_at(now))
    }

    pub fn is_complete_at(&self, now: Duration) -> bool {
        self.step_at(now) >= self.steps
    }
}

/// Result of [`FadeScheduler::start`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampStart {
    /// No ramp created; apply this volume now
    Immediate(f32),
    /// Ramp running; carries the value of any ramp it replaced
    Started { replaced: Option<f32> },
}

/// Volume update produced by [`FadeScheduler::advance`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampTick {
    pub slot: SourceSlot,
    pub volume: f32,
    pub purpose: RampPurpose,
    pub completed: bool,
}

/// One-ramp-per-slot volume scheduler
#[derive(Debug, Clone)]
pub struct FadeScheduler {
    primary: Option<Ramp>,
    transient: Option<Ramp>,
    steps: u32,
}

impl FadeScheduler {
    pub fn new(steps: u32) -> Self {
        Self {
            primary: None,
            transient: None,
            steps: steps.max(1),
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Begin a ramp on `slot`, cancelling whatever ramp was there
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        slot: SourceSlot,
        from: f32,
        to: f32,
        duration_secs: f64,
        curve: FadeCurve,
        purpose: RampPurpose,
        now: Duration,
    ) -> RampStart {
        let replaced = self.cancel(slot, now);
        let to = to.clamp(0.0, 1.0);

        let duration = secs_to_duration(duration_secs);
        if duration.is_zero() {
            return RampStart::Immediate(to);
        }

        *self.slot_mut(slot) = Some(Ramp {
            from: from.clamp(0.0, 1.0),
            to,
            duration,
            steps: self.steps,
            started_at: now,
            curve,
            purpose,
            last_step: 0,
        });
        RampStart::Started { replaced }
    }

    /// Drop the ramp on `slot`, returning its instantaneous value
    pub fn cancel(&mut self, slot: SourceSlot, now: Duration) -> Option<f32> {
        self.slot_mut(slot).take().map(|ramp| ramp.value_at(now))
    }

    pub fn cancel_all(&mut self) {
        self.primary = None;
        self.transient = None;
    }

    /// Advance every ramp to `now`
    ///
    /// Only slots whose step changed (or which completed) produce a tick.
    /// Completed ramps are removed.
    pub fn advance(&mut self, now: Duration) -> Vec<RampTick> {
        let mut ticks = Vec::new();
        for slot in [SourceSlot::Primary, SourceSlot::Transient] {
            let entry = self.slot_mut(slot);
            let Some(ramp) = entry.as_mut() else {
                continue;
            };

            let step = ramp.step_at(now);
            if step == ramp.last_step && step < ramp.steps {
                continue;
            }
            ramp.last_step = step;

            let completed = step >= ramp.steps;
            ticks.push(RampTick {
                slot,
                volume: ramp.value_for_step(step),
                purpose: ramp.purpose,
                completed,
            });
            if completed {
                *entry = None;
            }
        }
        ticks
    }

    pub fn ramp(&self, slot: SourceSlot) -> Option<&Ramp> {
        match slot {
            SourceSlot::Primary => self.primary.as_ref(),
            SourceSlot::Transient => self.transient.as_ref(),
        }
    }

    pub fn is_active(&self, slot: SourceSlot) -> bool {
        self.ramp(slot).is_some()
    }

    pub fn active_count(&self) -> usize {
        usize::from(self.primary.is_some()) + usize::from(self.transient.is_some())
    }

    fn slot_mut(&mut self, slot: SourceSlot) -> &mut Option<Ramp> {
        match slot {
            SourceSlot::Primary => &mut self.primary,
            SourceSlot::Transient => &mut self.transient,
        }
    }
}

impl Default for FadeScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_STEPS)
    }
}
