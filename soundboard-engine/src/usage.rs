//! Play-count bookkeeping driven by engine events
//!
//! The engine does no storage I/O. [`UsageTracker`] listens for
//! `trackChange` (count a play, stamp `last_used`) and `trackEnd` (stamp
//! `last_used` only) and writes through an injected [`TrackStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use soundboard_common::{EventBus, EventKind, ListenerId, SoundboardEvent, Track};
use tracing::{debug, warn};

use crate::error::Result;

/// Persistence for track records
pub trait TrackStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Track>;

    fn save(&self, track: Track) -> Result<()>;
}

/// HashMap-backed store for tests, demos and the CLI
#[derive(Debug, Default)]
pub struct InMemoryTrackStore {
    tracks: Mutex<HashMap<String, Track>>,
}

impl InMemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Track>> {
        self.tracks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TrackStore for InMemoryTrackStore {
    fn get(&self, id: &str) -> Option<Track> {
        self.lock().get(id).cloned()
    }

    fn save(&self, track: Track) -> Result<()> {
        self.lock().insert(track.id.clone(), track);
        Ok(())
    }
}

/// Event listener pair applying the usage contract
pub struct UsageTracker {
    bus: Arc<EventBus>,
    on_change: ListenerId,
    on_end: ListenerId,
}

impl UsageTracker {
    /// Start tracking usage for every event published on `bus`
    pub fn attach(bus: Arc<EventBus>, store: Arc<dyn TrackStore>) -> Self {
        let change_store = Arc::clone(&store);
        let on_change = bus.on(EventKind::TrackChange, move |event| {
            if let SoundboardEvent::TrackChange { track, timestamp, .. } = event {
                record(change_store.as_ref(), track, *timestamp, true);
            }
        });

        let on_end = bus.on(EventKind::TrackEnd, move |event| {
            if let SoundboardEvent::TrackEnd { track, timestamp, .. } = event {
                record(store.as_ref(), track, *timestamp, false);
            }
        });

        debug!("Usage tracker attached");
        Self {
            bus,
            on_change,
            on_end,
        }
    }

    /// Stop tracking; later events are ignored
    pub fn detach(self) {
        self.bus.off(EventKind::TrackChange, self.on_change);
        self.bus.off(EventKind::TrackEnd, self.on_end);
        debug!("Usage tracker detached");
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("on_change", &self.on_change)
            .field("on_end", &self.on_end)
            .finish()
    }
}

/// Stored record wins over the event's copy so counts accumulate
fn record(store: &dyn TrackStore, track: &Track, at: DateTime<Utc>, counted: bool) {
    let mut stored = store.get(&track.id).unwrap_or_else(|| track.clone());
    if counted {
        stored.record_play(at);
    } else {
        stored.touch(at);
    }

    let id = stored.id.clone();
    let usage_count = stored.usage_count;
    if let Err(e) = store.save(stored) {
        warn!("Failed to persist usage for track {}: {}", id, e);
    } else {
        debug!("Track {} usage_count={}", id, usage_count);
    }
}
