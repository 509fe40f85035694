//! Track model shared between storage, UI and the playback engine
//!
//! Tracks are owned by external storage. The engine only keeps a clone of the
//! track it currently has loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A playable soundboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Stable identity assigned by storage
    pub id: String,

    /// Display title
    pub title: String,

    /// Nominal duration in seconds (as stored; the device may report a more precise value)
    pub duration: f64,

    /// Resolved playable source (file path or `file://` URL)
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Track was authored to loop seamlessly
    #[serde(default)]
    pub loop_friendly: bool,

    /// Number of times the track has been started
    #[serde(default)]
    pub usage_count: u64,

    /// Last time the track was started or finished
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration: f64,
        audio_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
            audio_url,
            loop_friendly: false,
            usage_count: 0,
            last_used: None,
        }
    }

    /// Create a track with a freshly generated id (ad-hoc uploads, CLI playback)
    pub fn with_generated_id(
        title: impl Into<String>,
        duration: f64,
        audio_url: impl Into<String>,
    ) -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            title,
            duration,
            Some(audio_url.into()),
        )
    }

    /// The playable source, if the track has a non-blank one
    pub fn resolved_source(&self) -> Option<&str> {
        self.audio_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Count one play and stamp `last_used`
    pub fn record_play(&mut self, at: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used = Some(at);
    }

    /// Refresh `last_used` without counting a play
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_used = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_source_ignores_blank_urls() {
        let mut track = Track::new("t1", "Airhorn", 3.0, Some("   ".to_string()));
        assert_eq!(track.resolved_source(), None);

        track.audio_url = None;
        assert_eq!(track.resolved_source(), None);

        track.audio_url = Some(" sounds/airhorn.mp3 ".to_string());
        assert_eq!(track.resolved_source(), Some("sounds/airhorn.mp3"));
    }

    #[test]
    fn test_record_play_increments_and_stamps() {
        let mut track = Track::new("t1", "Airhorn", 3.0, None);
        let at = Utc::now();
        track.record_play(at);
        track.record_play(at);

        assert_eq!(track.usage_count, 2);
        assert_eq!(track.last_used, Some(at));
    }

    #[test]
    fn test_touch_does_not_count_play() {
        let mut track = Track::new("t1", "Airhorn", 3.0, None);
        let at = Utc::now();
        track.touch(at);

        assert_eq!(track.usage_count, 0);
        assert_eq!(track.last_used, Some(at));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Track::with_generated_id("a", 1.0, "a.wav");
        let b = Track::with_generated_id("b", 1.0, "b.wav");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_deserializes_storage_json() {
        let json = r#"{"id":"t9","title":"Rimshot","duration":1.5,"audioUrl":"rim.mp3","usageCount":4}"#;
        let track: Track = serde_json::from_str(json).unwrap();

        assert_eq!(track.id, "t9");
        assert_eq!(track.audio_url.as_deref(), Some("rim.mp3"));
        assert_eq!(track.usage_count, 4);
        assert!(!track.loop_friendly);
        assert!(track.last_used.is_none());
    }
}
