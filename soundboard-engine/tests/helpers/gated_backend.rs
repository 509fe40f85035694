//! Backend whose start futures stay pending until the test releases them

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use soundboard_engine::{Error, PlaybackBackend, PlaybackSource, Result, SourceRequest};
use tokio::sync::Semaphore;

pub struct GatedBackend {
    gate: Arc<Semaphore>,
    opened: AtomicUsize,
}

impl GatedBackend {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            opened: AtomicUsize::new(0),
        }
    }

    /// Let `n` pending (or future) starts complete
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Sources opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl PlaybackBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn open(&self, _request: &SourceRequest<'_>) -> Result<Box<dyn PlaybackSource>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(GatedSource {
            gate: Arc::clone(&self.gate),
            volume: 1.0,
            position: 0.0,
            playing: false,
        }))
    }
}

struct GatedSource {
    gate: Arc<Semaphore>,
    volume: f32,
    position: f64,
    playing: bool,
}

impl PlaybackSource for GatedSource {
    fn play(&mut self) -> BoxFuture<'static, Result<()>> {
        self.playing = true;
        let gate = Arc::clone(&self.gate);
        async move {
            let permit = gate
                .acquire_owned()
                .await
                .map_err(|_| Error::DeviceRejected("gate closed".to_string()))?;
            permit.forget();
            Ok(())
        }
        .boxed()
    }

    fn resume(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds;
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn take_ended(&mut self) -> bool {
        false
    }
}
