//! Clock-driven backend without audio I/O
//!
//! Sources behave like a media element: they advance with the injected
//! [`Clock`] while playing and end when the position reaches the track's
//! stored duration. Host policy can be simulated: blocked autoplay makes
//! `play` fail with `DeviceRejected`, and individual URLs can be marked
//! unavailable so `open` fails.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::{PlaybackBackend, PlaybackSource, SourceRequest};
use crate::clock::Clock;
use crate::error::{Error, Result};

#[derive(Default)]
struct Policy {
    autoplay_blocked: AtomicBool,
    unavailable: Mutex<HashSet<String>>,
    opened: AtomicUsize,
    live: AtomicUsize,
}

pub struct VirtualBackend {
    clock: Arc<dyn Clock>,
    policy: Arc<Policy>,
}

impl VirtualBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            policy: Arc::new(Policy::default()),
        }
    }

    /// Simulate a host that refuses to start playback
    pub fn set_autoplay_blocked(&self, blocked: bool) {
        self.policy.autoplay_blocked.store(blocked, Ordering::SeqCst);
    }

    /// Make `open` fail for this URL
    pub fn mark_unavailable(&self, url: impl Into<String>) {
        self.policy
            .unavailable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into());
    }

    /// Sources opened since creation
    pub fn opened_count(&self) -> usize {
        self.policy.opened.load(Ordering::SeqCst)
    }

    /// Sources opened and not yet dropped
    pub fn live_sources(&self) -> usize {
        self.policy.live.load(Ordering::SeqCst)
    }
}

impl PlaybackBackend for VirtualBackend {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn open(&self, request: &SourceRequest<'_>) -> Result<Box<dyn PlaybackSource>> {
        let unavailable = self
            .policy
            .unavailable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(request.url);
        if unavailable {
            return Err(Error::source_error(
                request.track_id,
                format!("source '{}' is unavailable", request.url),
            ));
        }

        self.policy.opened.fetch_add(1, Ordering::SeqCst);
        self.policy.live.fetch_add(1, Ordering::SeqCst);
        debug!("Virtual source opened: {}", request.url);

        let duration = (request.duration_hint.is_finite() && request.duration_hint > 0.0)
            .then_some(request.duration_hint);

        Ok(Box::new(VirtualSource {
            clock: Arc::clone(&self.clock),
            policy: Arc::clone(&self.policy),
            duration,
            base_position: 0.0,
            playing_since: None,
            volume: 1.0,
            ended: false,
        }))
    }
}

struct VirtualSource {
    clock: Arc<dyn Clock>,
    policy: Arc<Policy>,
    duration: Option<f64>,
    /// Position at the moment playback last started or was frozen
    base_position: f64,
    /// Clock reading when playback last started
    playing_since: Option<Duration>,
    volume: f32,
    ended: bool,
}

impl VirtualSource {
    fn start(&mut self) -> Result<()> {
        if self.policy.autoplay_blocked.load(Ordering::SeqCst) {
            return Err(Error::DeviceRejected(
                "playback blocked by autoplay policy".to_string(),
            ));
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(self.clock.now());
        }
        self.ended = false;
        Ok(())
    }

    /// Freeze the position at its current value
    fn freeze(&mut self) {
        self.base_position = self.position();
        self.playing_since = None;
    }
}

impl PlaybackSource for VirtualSource {
    fn play(&mut self) -> BoxFuture<'static, Result<()>> {
        future::ready(self.start()).boxed()
    }

    fn resume(&mut self) -> Result<()> {
        self.start()
    }

    fn pause(&mut self) {
        self.freeze();
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn position(&self) -> f64 {
        let running = self
            .playing_since
            .map(|since| self.clock.now().saturating_sub(since).as_secs_f64())
            .unwrap_or(0.0);
        let position = self.base_position + running;
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn seek(&mut self, seconds: f64) {
        self.base_position = seconds.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(self.clock.now());
        }
        self.ended = false;
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    fn take_ended(&mut self) -> bool {
        let Some(duration) = self.duration else {
            return false;
        };
        if self.ended || self.playing_since.is_none() || self.position() < duration {
            return false;
        }
        self.freeze();
        self.ended = true;
        true
    }
}

impl Drop for VirtualSource {
    fn drop(&mut self) {
        self.policy.live.fetch_sub(1, Ordering::SeqCst);
    }
}
