//! Shared fixtures for engine integration tests
//!
//! - TestRig: engine on a ManualClock + VirtualBackend with an event recorder
//! - GatedBackend: sources whose start future waits for an explicit release

#![allow(dead_code)]

pub mod gated_backend;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use soundboard_engine::{
    AudioEngine, AudioSettings, EventKind, ManualClock, SoundboardEvent, Track, VirtualBackend,
};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub use gated_backend::GatedBackend;

pub fn track(id: &str, duration: f64) -> Track {
    Track::new(id, format!("Sound {id}"), duration, Some(format!("file:///sounds/{id}.wav")))
}

pub struct TestRig {
    pub clock: Arc<ManualClock>,
    pub backend: Arc<VirtualBackend>,
    pub engine: Arc<AudioEngine>,
    events: Mutex<broadcast::Receiver<SoundboardEvent>>,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_settings(AudioSettings::default())
    }

    pub fn with_settings(settings: AudioSettings) -> Self {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(VirtualBackend::new(clock.clone()));
        let engine = Arc::new(
            AudioEngine::builder()
                .clock(clock.clone())
                .backend(backend.clone())
                .settings(settings)
                .event_capacity(4096)
                .build(),
        );
        let events = Mutex::new(engine.subscribe());
        Self {
            clock,
            backend,
            engine,
            events,
        }
    }

    /// Move the clock forward and run one tick
    pub fn advance(&self, seconds: f64) {
        self.clock.advance_secs(seconds);
        self.engine.tick();
    }

    /// Move the clock forward in `step`-second increments, ticking after each
    pub fn advance_by_steps(&self, seconds: f64, step: f64) {
        let steps = (seconds / step).round() as usize;
        for _ in 0..steps {
            self.advance(step);
        }
    }

    /// Events emitted since the last call
    pub fn take_events(&self) -> Vec<SoundboardEvent> {
        let mut rx = self.events.lock().unwrap();
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        out
    }

    /// Events of one kind emitted since the last `take_events*` call
    pub fn take_events_of(&self, kind: EventKind) -> Vec<SoundboardEvent> {
        self.take_events()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }

    /// Register a stop listener that counts its invocations
    pub fn count_stops(&self, track_id: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        self.engine.register_stop_listener(track_id, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        count
    }
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
