//! Loop bookkeeping
//!
//! Decides, on each natural track end, whether to restart the track or let
//! the engine go Idle. A configured count `n` means `n` additional full
//! replays after the first playthrough; `-1` (any negative count) loops
//! forever.

use soundboard_common::LoopSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopLimit {
    Infinite,
    Finite(u32),
}

impl LoopLimit {
    pub fn from_count(count: i32) -> Self {
        u32::try_from(count).map_or(LoopLimit::Infinite, LoopLimit::Finite)
    }

    pub fn as_count(&self) -> i32 {
        match self {
            LoopLimit::Infinite => -1,
            LoopLimit::Finite(n) => i32::try_from(*n).unwrap_or(i32::MAX),
        }
    }
}

/// What to do when the current track reaches its end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    /// Seek to 0 and keep playing
    Restart,
    /// Go Idle and emit `trackEnd`; carries the replays performed
    Finish { loops_played: u32 },
}

#[derive(Debug, Clone)]
pub struct LoopController {
    enabled: bool,
    limit: LoopLimit,
    current: u32,
}

impl LoopController {
    pub fn new(enabled: bool, count: i32) -> Self {
        Self {
            enabled,
            limit: LoopLimit::from_count(count),
            current: 0,
        }
    }

    /// Replace the loop configuration; the running counter starts over
    pub fn configure(&mut self, enabled: bool, count: i32) {
        self.enabled = enabled;
        self.limit = LoopLimit::from_count(count);
        self.current = 0;
    }

    pub fn settings(&self) -> LoopSettings {
        LoopSettings {
            enabled: self.enabled,
            count: self.limit.as_count(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Replays performed so far for the current track
    pub fn current_loop_count(&self) -> u32 {
        self.current
    }

    /// Called whenever a new track becomes current
    pub fn reset(&mut self) {
        self.current = 0;
    }

    pub fn on_track_end(&mut self) -> LoopDecision {
        if !self.enabled {
            return self.finish();
        }

        match self.limit {
            LoopLimit::Infinite => LoopDecision::Restart,
            LoopLimit::Finite(limit) if self.current < limit => {
                self.current += 1;
                LoopDecision::Restart
            }
            LoopLimit::Finite(_) => self.finish(),
        }
    }

    fn finish(&mut self) -> LoopDecision {
        let loops_played = self.current;
        self.current = 0;
        LoopDecision::Finish { loops_played }
    }
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new(false, -1)
    }
}
