//! soundboard-engine configuration file
//!
//! ```toml
//! [audio]
//! volume = 0.8
//! crossfade_duration = 2.0
//! loop_enabled = false
//! loop_count = -1
//!
//! [engine]
//! backend = "cpal"          # or "virtual"
//! device = "USB Audio"      # optional, default output device otherwise
//! update_interval_ms = 16
//! fade_steps = 60
//! time_update_interval_ms = 250
//! event_capacity = 256
//!
//! [logging]
//! level = "soundboard_engine=debug"
//! ```
//!
//! Every key is optional; missing keys take the defaults shown.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soundboard_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use soundboard_common::time::millis_to_duration;
use soundboard_common::AudioSettings;
use tracing::info;

use crate::backend::{CpalBackend, PlaybackBackend, VirtualBackend};
use crate::clock::{Clock, SystemClock};
use crate::engine::{
    AudioEngine, DEFAULT_EVENT_CAPACITY, DEFAULT_TIME_UPDATE_INTERVAL, DEFAULT_UPDATE_INTERVAL,
};
use crate::error::{Error, Result};
use crate::fader::DEFAULT_FADE_STEPS;

/// Which playback backend the engine is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// symphonia decode + cpal output
    #[default]
    Cpal,
    /// Clock-driven, no audio I/O
    Virtual,
}

/// `[engine]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    pub backend: BackendKind,
    /// Output device name (cpal backend only)
    pub device: Option<String>,
    /// Period of the update loop driving fades and track-end detection
    pub update_interval_ms: u64,
    /// Discrete volume steps per ramp
    pub fade_steps: u32,
    pub time_update_interval_ms: u64,
    /// Broadcast buffer for async event subscribers
    pub event_capacity: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            backend: BackendKind::Cpal,
            device: None,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL.as_millis() as u64,
            fade_steps: DEFAULT_FADE_STEPS,
            time_update_interval_ms: DEFAULT_TIME_UPDATE_INTERVAL.as_millis() as u64,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineTuning {
    pub fn update_interval(&self) -> Duration {
        millis_to_duration(self.update_interval_ms.max(1))
    }

    pub fn time_update_interval(&self) -> Duration {
        millis_to_duration(self.time_update_interval_ms)
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: Option<String>,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioSettings,
    pub engine: EngineTuning,
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve and load the config file (CLI path, then `SOUNDBOARD_CONFIG`,
    /// then the platform config dir); defaults when none exists
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        let config: Config = load_toml_or_default(path.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(soundboard_common::Error::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.fade_steps == 0 {
            return Err(Error::Config("engine.fade_steps must be at least 1".to_string()));
        }
        if self.engine.event_capacity == 0 {
            return Err(Error::Config("engine.event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build an engine with the configured backend on the system clock
    pub fn build_engine(&self) -> AudioEngine {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let backend: Arc<dyn PlaybackBackend> = match self.engine.backend {
            BackendKind::Cpal => Arc::new(CpalBackend::new(self.engine.device.clone())),
            BackendKind::Virtual => Arc::new(VirtualBackend::new(Arc::clone(&clock))),
        };
        info!("Building engine with {:?} backend", self.engine.backend);

        AudioEngine::builder()
            .backend(backend)
            .clock(clock)
            .settings(self.audio.clone())
            .fade_steps(self.engine.fade_steps)
            .event_capacity(self.engine.event_capacity)
            .time_update_interval(self.engine.time_update_interval())
            .build()
    }
}
