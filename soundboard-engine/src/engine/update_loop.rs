//! Background task that ticks the engine

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::core::AudioEngine;

/// Default tick period (about one display frame)
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to a running update loop
pub struct UpdateLoop {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl UpdateLoop {
    /// Stop ticking and wait for the task to exit
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            warn!("Update loop task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn a task calling [`AudioEngine::tick`] every `period`
///
/// Must be called from within a tokio runtime. Missed ticks are skipped
/// rather than replayed in a burst.
pub fn spawn_update_loop(engine: Arc<AudioEngine>, period: Duration) -> UpdateLoop {
    let period = period.max(Duration::from_millis(1));
    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Update loop started ({}ms period)", period.as_millis());

        loop {
            tokio::select! {
                _ = signal.notified() => break,
                _ = ticker.tick() => engine.tick(),
            }
        }
        debug!("Update loop stopped");
    });

    UpdateLoop { shutdown, handle }
}
