//! Per-track one-shot "you were displaced" callbacks
//!
//! The UI element that last started a track registers a callback under the
//! track id. When the engine moves on (another play, a stop, a committed
//! crossfade) it takes the callback out and runs it, so each registration
//! fires at most once.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use tracing::{debug, error};

type StopCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct StopListenerRegistry {
    listeners: Mutex<HashMap<String, StopCallback>>,
}

impl StopListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the listener for `track_id`, replacing any existing one
    pub fn register<F>(&self, track_id: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let track_id = track_id.into();
        let replaced = self.lock().insert(track_id.clone(), Box::new(callback));
        if replaced.is_some() {
            debug!("Replaced stop listener for track {}", track_id);
        }
    }

    /// Remove without calling; returns whether one was registered
    pub fn unregister(&self, track_id: &str) -> bool {
        self.lock().remove(track_id).is_some()
    }

    /// Remove and run the listener for `track_id`
    ///
    /// Must be called without any engine lock held: the callback may call
    /// back into the engine. A panicking callback is logged and swallowed.
    /// Returns whether a listener was run.
    pub fn notify(&self, track_id: &str) -> bool {
        // Lock released before the callback runs
        let callback = self.lock().remove(track_id);
        let Some(callback) = callback else {
            return false;
        };

        debug!("Notifying stop listener for track {}", track_id);
        if catch_unwind(AssertUnwindSafe(callback)).is_err() {
            error!("Stop listener for track {} panicked", track_id);
        }
        true
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.lock().contains_key(track_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StopCallback>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for StopListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopListenerRegistry")
            .field("tracks", &self.lock().keys().cloned().collect::<Vec<_>>())
            .finish()
    }
}
