//! Error types for soundboard-engine
//!
//! Every variant is recoverable: the engine returns to Idle and the caller
//! decides whether to retry, pick another track or tell the user.

use soundboard_common::PlaybackErrorKind;
use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Track has no resolvable audio source (or the backend cannot open it)
    #[error("Source error for track '{track_id}': {reason}")]
    Source { track_id: String, reason: String },

    /// Host policy refused to start playback
    #[error("Playback rejected by device: {0}")]
    DeviceRejected(String),

    /// A later play or stop took over before this start completed
    ///
    /// A cancellation, not a failure: no `error` event is emitted for it.
    #[error("Start of track '{track_id}' superseded")]
    Superseded { track_id: String },

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from soundboard-common
    #[error(transparent)]
    Common(#[from] soundboard_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn source_error(track_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Source {
            track_id: track_id.into(),
            reason: reason.into(),
        }
    }

    /// Category reported in `error` events
    pub fn kind(&self) -> PlaybackErrorKind {
        match self {
            Error::DeviceRejected(_) => PlaybackErrorKind::DeviceRejected,
            Error::Decode(_) => PlaybackErrorKind::DecodeError,
            Error::AudioOutput(_) => PlaybackErrorKind::OutputError,
            Error::Source { .. }
            | Error::Superseded { .. }
            | Error::Config(_)
            | Error::Common(_)
            | Error::Io(_) => PlaybackErrorKind::SourceError,
        }
    }
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::source_error("t1", "no url").kind(),
            PlaybackErrorKind::SourceError
        );
        assert_eq!(
            Error::DeviceRejected("autoplay".into()).kind(),
            PlaybackErrorKind::DeviceRejected
        );
        assert_eq!(Error::Decode("bad frame".into()).kind(), PlaybackErrorKind::DecodeError);
        assert_eq!(Error::AudioOutput("gone".into()).kind(), PlaybackErrorKind::OutputError);
    }

    #[test]
    fn test_source_error_message() {
        let err = Error::source_error("t7", "track has no audio source");
        assert_eq!(
            err.to_string(),
            "Source error for track 't7': track has no audio source"
        );
    }
}
