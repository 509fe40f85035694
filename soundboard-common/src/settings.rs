//! Audio settings and the canonical volume representation
//!
//! Volume is stored as a 0.0-1.0 unit value everywhere inside the engine.
//! The 0-100 percent scale exists only at the public setter/getter boundary.

use serde::{Deserialize, Serialize};

use crate::FadeCurve;

/// Canonical playback volume, always within 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Volume(f32);

impl Volume {
    pub const MIN: Volume = Volume(0.0);
    pub const MAX: Volume = Volume(1.0);

    /// Build from a unit value, clamping out-of-range input (NaN becomes silence)
    pub fn from_unit(value: f32) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Build from the 0-100 percent scale used at the public API
    pub fn from_percent(percent: f32) -> Self {
        Self::from_unit(percent / 100.0)
    }

    pub fn as_unit(&self) -> f32 {
        self.0
    }

    pub fn as_percent(&self) -> f32 {
        self.0 * 100.0
    }

    pub fn is_silent(&self) -> bool {
        self.0 <= 0.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(0.8)
    }
}

impl From<f32> for Volume {
    fn from(value: f32) -> Self {
        Self::from_unit(value)
    }
}

impl From<Volume> for f32 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

/// Process-wide playback settings
///
/// Mutated only through engine setters; read by the UI for display.
/// Ducking and normalization are flags for downstream consumers, the engine
/// applies no DSP for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Configured output volume (canonical 0-1)
    pub volume: Volume,

    /// Seconds to ramp 0 → volume after a track starts (0 = start at full volume)
    pub fade_in_duration: f64,

    /// Seconds used by `stop_with_fade`
    pub fade_out_duration: f64,

    /// Seconds both tracks overlap during a crossfade
    pub crossfade_duration: f64,

    pub ducking_enabled: bool,
    pub ducking_threshold: f32,
    pub ducking_amount: f32,

    pub normalization_enabled: bool,

    pub loop_enabled: bool,

    /// Additional replays after the first playthrough (-1 = infinite)
    pub loop_count: i32,

    /// Ramp shape for fades and crossfades
    pub fade_curve: FadeCurve,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: Volume::default(),
            fade_in_duration: 0.0,
            fade_out_duration: 1.0,
            crossfade_duration: 2.0,
            ducking_enabled: false,
            ducking_threshold: 0.3,
            ducking_amount: 0.5,
            normalization_enabled: false,
            loop_enabled: false,
            loop_count: -1,
            fade_curve: FadeCurve::Linear,
        }
    }
}

impl AudioSettings {
    /// Apply every field present in `patch`, sanitizing durations
    pub fn apply(&mut self, patch: &AudioSettingsPatch) {
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(d) = patch.fade_in_duration {
            self.fade_in_duration = sanitize_duration(d);
        }
        if let Some(d) = patch.fade_out_duration {
            self.fade_out_duration = sanitize_duration(d);
        }
        if let Some(d) = patch.crossfade_duration {
            self.crossfade_duration = sanitize_duration(d);
        }
        if let Some(enabled) = patch.ducking_enabled {
            self.ducking_enabled = enabled;
        }
        if let Some(threshold) = patch.ducking_threshold {
            self.ducking_threshold = threshold.clamp(0.0, 1.0);
        }
        if let Some(amount) = patch.ducking_amount {
            self.ducking_amount = amount.clamp(0.0, 1.0);
        }
        if let Some(enabled) = patch.normalization_enabled {
            self.normalization_enabled = enabled;
        }
        if let Some(enabled) = patch.loop_enabled {
            self.loop_enabled = enabled;
        }
        if let Some(count) = patch.loop_count {
            self.loop_count = count.max(-1);
        }
        if let Some(curve) = patch.fade_curve {
            self.fade_curve = curve;
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            enabled: self.loop_enabled,
            count: self.loop_count,
        }
    }
}

/// Partial settings update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettingsPatch {
    pub volume: Option<Volume>,
    pub fade_in_duration: Option<f64>,
    pub fade_out_duration: Option<f64>,
    pub crossfade_duration: Option<f64>,
    pub ducking_enabled: Option<bool>,
    pub ducking_threshold: Option<f32>,
    pub ducking_amount: Option<f32>,
    pub normalization_enabled: Option<bool>,
    pub loop_enabled: Option<bool>,
    pub loop_count: Option<i32>,
    pub fade_curve: Option<FadeCurve>,
}

/// Loop configuration as exposed by `loop_settings()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    pub enabled: bool,
    /// -1 = infinite
    pub count: i32,
}

fn sanitize_duration(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamps_percent() {
        assert_eq!(Volume::from_percent(150.0).as_percent(), 100.0);
        assert_eq!(Volume::from_percent(-3.0).as_percent(), 0.0);
        assert_eq!(Volume::from_percent(50.0).as_unit(), 0.5);
    }

    #[test]
    fn test_volume_nan_is_silent() {
        assert!(Volume::from_unit(f32::NAN).is_silent());
    }

    #[test]
    fn test_volume_deserialize_clamps() {
        let v: Volume = serde_json::from_str("1.7").unwrap();
        assert_eq!(v, Volume::MAX);
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut settings = AudioSettings::default();
        let patch = AudioSettingsPatch {
            crossfade_duration: Some(4.0),
            fade_curve: Some(FadeCurve::EqualPower),
            ..Default::default()
        };
        settings.apply(&patch);

        assert_eq!(settings.crossfade_duration, 4.0);
        assert_eq!(settings.fade_curve, FadeCurve::EqualPower);
        assert_eq!(settings.volume, Volume::default());
        assert_eq!(settings.fade_out_duration, 1.0);
    }

    #[test]
    fn test_patch_sanitizes_bad_durations() {
        let mut settings = AudioSettings::default();
        settings.apply(&AudioSettingsPatch {
            fade_in_duration: Some(-2.0),
            fade_out_duration: Some(f64::NAN),
            ..Default::default()
        });

        assert_eq!(settings.fade_in_duration, 0.0);
        assert_eq!(settings.fade_out_duration, 0.0);
    }

    #[test]
    fn test_settings_toml_defaults() {
        let settings: AudioSettings = toml::from_str("volume = 0.5\nloop_enabled = true").unwrap();
        assert_eq!(settings.volume.as_unit(), 0.5);
        assert!(settings.loop_enabled);
        assert_eq!(settings.loop_count, -1);
        assert_eq!(settings.fade_curve, FadeCurve::Linear);
    }
}
