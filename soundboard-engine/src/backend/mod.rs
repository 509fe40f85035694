//! Playback backend abstractions
//!
//! The engine never touches an audio device directly. It asks a
//! [`PlaybackBackend`] to open a [`PlaybackSource`] for a track and drives
//! that source (start, pause, volume, seek). Backends are chosen when the
//! engine is built:
//!
//! - [`VirtualBackend`]: element-like, clock-driven, no audio I/O. Used by
//!   tests and headless runs.
//! - [`CpalBackend`]: decodes with symphonia and mixes into a cpal output
//!   stream.

use futures::future::BoxFuture;
use std::path::PathBuf;

use crate::error::{Error, Result};

mod cpal_backend;
mod virtual_backend;

pub use cpal_backend::CpalBackend;
pub use virtual_backend::VirtualBackend;

/// What the engine asks a backend to open
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest<'a> {
    pub track_id: &'a str,
    pub url: &'a str,
    /// Duration stored on the track, in seconds (may be imprecise or 0)
    pub duration_hint: f64,
}

/// Factory for playback sources
pub trait PlaybackBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a source for `request`; nothing plays until [`PlaybackSource::play`]
    fn open(&self, request: &SourceRequest<'_>) -> Result<Box<dyn PlaybackSource>>;
}

/// A single opened track on the device
///
/// Volumes are canonical 0.0-1.0 values. Positions are seconds.
pub trait PlaybackSource: Send {
    /// Start playback from the current position
    ///
    /// The returned future resolves once the device accepted the request,
    /// or fails with [`Error::DeviceRejected`] if host policy refused it.
    fn play(&mut self) -> BoxFuture<'static, Result<()>>;

    /// Continue after a pause; same policy checks as `play`, but synchronous
    fn resume(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    fn position(&self) -> f64;

    /// Move the playhead; callers clamp to `[0, duration]`
    fn seek(&mut self, seconds: f64);

    /// Device-reported length, if known
    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;

    /// True exactly once after the source played through to its end
    fn take_ended(&mut self) -> bool;
}

/// Map a track URL to a local file path
///
/// Accepts plain paths and `file://` URLs. Other schemes are not playable
/// by the local backends.
pub fn local_path(request: &SourceRequest<'_>) -> Result<PathBuf> {
    let url = request.url.trim();
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(Error::source_error(
            request.track_id,
            format!("unsupported source scheme '{}'", scheme),
        ));
    }
    Ok(PathBuf::from(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> SourceRequest<'_> {
        SourceRequest {
            track_id: "t1",
            url,
            duration_hint: 0.0,
        }
    }

    #[test]
    fn test_local_path_variants() {
        assert_eq!(
            local_path(&request("sounds/horn.wav")).unwrap(),
            PathBuf::from("sounds/horn.wav")
        );
        assert_eq!(
            local_path(&request("file:///tmp/horn.wav")).unwrap(),
            PathBuf::from("/tmp/horn.wav")
        );
    }

    #[test]
    fn test_remote_scheme_is_source_error() {
        let err = local_path(&request("https://cdn.example.com/horn.mp3")).unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }
}
