//! Event types for the soundboard event system
//!
//! Provides the shared event definitions and the EventBus through which the
//! engine notifies UI widgets, usage tracking and any async consumers.

mod playback_types;

pub use playback_types::{EngineState, FadeDirection, PlaybackErrorKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::error;

use crate::{Track, Volume};

/// Soundboard event types
///
/// Every variant carries its own payload plus the time it was raised.
/// Serialized with a `type` tag so SSE/JSON consumers can switch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SoundboardEvent {
    /// A new track became the current track
    ///
    /// Raised when a hard-cut play starts or a crossfade commits.
    /// Usage tracking counts a play on this event.
    #[serde(rename_all = "camelCase")]
    TrackChange {
        track: Track,
        previous_track_id: Option<String>,
        crossfade: bool,
        timestamp: DateTime<Utc>,
    },

    /// Engine state changed (Playing ↔ Paused, → Idle, ...)
    #[serde(rename_all = "camelCase")]
    PlayStateChange {
        state: EngineState,
        is_playing: bool,
        track_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Configured output volume changed
    VolumeChange {
        volume: Volume,
        timestamp: DateTime<Utc>,
    },

    /// Periodic playback position report
    #[serde(rename_all = "camelCase")]
    TimeUpdate {
        track_id: String,
        current_time: f64,
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Track finished naturally and will not loop again
    #[serde(rename_all = "camelCase")]
    TrackEnd {
        track: Track,
        loops_played: u32,
        timestamp: DateTime<Utc>,
    },

    /// Playback failed; the engine is back in Idle
    #[serde(rename_all = "camelCase")]
    Error {
        kind: PlaybackErrorKind,
        track_id: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Volume ramp started
    #[serde(rename_all = "camelCase")]
    FadeStart {
        direction: FadeDirection,
        track_id: Option<String>,
        from: Volume,
        to: Volume,
        duration: f64,
        timestamp: DateTime<Utc>,
    },

    /// Volume ramp reached its target
    #[serde(rename_all = "camelCase")]
    FadeComplete {
        direction: FadeDirection,
        track_id: Option<String>,
        volume: Volume,
        timestamp: DateTime<Utc>,
    },
}

impl SoundboardEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SoundboardEvent::TrackChange { .. } => EventKind::TrackChange,
            SoundboardEvent::PlayStateChange { .. } => EventKind::PlayStateChange,
            SoundboardEvent::VolumeChange { .. } => EventKind::VolumeChange,
            SoundboardEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
            SoundboardEvent::TrackEnd { .. } => EventKind::TrackEnd,
            SoundboardEvent::Error { .. } => EventKind::Error,
            SoundboardEvent::FadeStart { .. } => EventKind::FadeStart,
            SoundboardEvent::FadeComplete { .. } => EventKind::FadeComplete,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SoundboardEvent::TrackChange { timestamp, .. }
            | SoundboardEvent::PlayStateChange { timestamp, .. }
            | SoundboardEvent::VolumeChange { timestamp, .. }
            | SoundboardEvent::TimeUpdate { timestamp, .. }
            | SoundboardEvent::TrackEnd { timestamp, .. }
            | SoundboardEvent::Error { timestamp, .. }
            | SoundboardEvent::FadeStart { timestamp, .. }
            | SoundboardEvent::FadeComplete { timestamp, .. } => *timestamp,
        }
    }
}

/// Event discriminant used to register callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    TrackChange,
    PlayStateChange,
    VolumeChange,
    TimeUpdate,
    TrackEnd,
    Error,
    FadeStart,
    FadeComplete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TrackChange => "trackChange",
            EventKind::PlayStateChange => "playStateChange",
            EventKind::VolumeChange => "volumeChange",
            EventKind::TimeUpdate => "timeUpdate",
            EventKind::TrackEnd => "trackEnd",
            EventKind::Error => "error",
            EventKind::FadeStart => "fadeStart",
            EventKind::FadeComplete => "fadeComplete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`EventBus::on`], needed to unregister the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&SoundboardEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    callback: Callback,
}

/// Central event distribution
///
/// Two delivery paths:
/// - Callbacks registered with [`on`](Self::on) run synchronously inside
///   `emit`, in registration order. A panicking callback is caught and
///   logged; the remaining callbacks for the event still run.
/// - Every emitted event is also sent on a tokio broadcast channel for
///   async consumers ([`subscribe`](Self::subscribe)). Lagging receivers
///   lose the oldest events.
///
/// The listener list is snapshotted before dispatch, so callbacks may
/// register or remove listeners (or call back into the engine) freely.
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<SoundboardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given broadcast channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Register a callback for one event kind
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&SoundboardEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push(Listener {
            id,
            kind,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a callback; returns false if it was not registered for `kind`
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|l| !(l.id == id && l.kind == kind));
        listeners.len() != before
    }

    /// Number of callbacks registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock_listeners().iter().filter(|l| l.kind == kind).count()
    }

    /// Dispatch an event to callbacks, then to broadcast subscribers
    ///
    /// Returns how many callbacks panicked.
    pub fn emit(&self, event: SoundboardEvent) -> usize {
        let kind = event.kind();
        let callbacks: Vec<Callback> = self
            .lock_listeners()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.callback))
            .collect();

        let mut failures = 0;
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                failures += 1;
                error!("Subscriber for '{}' event panicked; continuing dispatch", kind);
            }
        }

        // No receivers is fine
        let _ = self.tx.send(event);
        failures
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SoundboardEvent> {
        self.tx.subscribe()
    }

    /// Number of active broadcast receivers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured broadcast channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.lock_listeners().len())
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}
