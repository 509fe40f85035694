//! Soundboard engine CLI - plays sound files through the playback engine
//!
//! Files play in order. With `--crossfade` each next file starts fading in
//! `crossfade_duration` seconds before the current one ends; otherwise the
//! next file starts on `trackEnd`. Ctrl+C stops playback cleanly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundboard_engine::audio::SimpleDecoder;
use soundboard_engine::{
    spawn_update_loop, BackendKind, Config, CpalBackend, InMemoryTrackStore, SoundboardEvent,
    Track, TrackStore, UsageTracker, Volume,
};

/// Command-line arguments for soundboard-engine
#[derive(Parser, Debug)]
#[command(name = "soundboard-engine")]
#[command(about = "Play sound files through the soundboard playback engine")]
#[command(version)]
struct Args {
    /// Audio files to play, in order
    files: Vec<PathBuf>,

    /// Config file (overrides SOUNDBOARD_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playback backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendKind>,

    /// Output device name (cpal backend)
    #[arg(short, long)]
    device: Option<String>,

    /// Crossfade from each file into the next
    #[arg(short = 'x', long)]
    crossfade: bool,

    /// Replays per file after the first playthrough (-1 = forever)
    #[arg(short, long, allow_hyphen_values = true)]
    loop_count: Option<i32>,

    /// Volume, 0-100
    #[arg(short, long)]
    volume: Option<f32>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print every engine event to stdout as one JSON object per line
    #[arg(long)]
    events_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let default_filter = config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "soundboard_engine=info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        let devices = CpalBackend::list_devices().context("Failed to enumerate output devices")?;
        for device in devices {
            println!("{}", device);
        }
        return Ok(());
    }

    if args.files.is_empty() {
        bail!("No audio files given (try --help)");
    }

    info!(
        "Starting soundboard engine: {} file(s), backend={:?}, volume={:.0}%",
        args.files.len(),
        config.engine.backend,
        config.audio.volume.as_percent()
    );

    let engine = Arc::new(config.build_engine());
    let store = Arc::new(InMemoryTrackStore::new());
    let tracker = UsageTracker::attach(Arc::clone(engine.event_bus()), store.clone());
    let update_loop = spawn_update_loop(Arc::clone(&engine), config.engine.update_interval());

    let tracks: Vec<Track> = args.files.iter().map(|path| track_for_file(path)).collect();
    let track_ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
    let crossfade_window = if args.crossfade {
        config.audio.crossfade_duration
    } else {
        0.0
    };

    let mut events = BroadcastStream::new(engine.subscribe());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let total = tracks.len();
    'tracks: for (index, track) in tracks.into_iter().enumerate() {
        let id = track.id.clone();
        let has_next = index + 1 < total;
        let crossfade = args.crossfade && index > 0;

        info!("[{}/{}] {}", index + 1, total, track.title);
        if let Err(e) = engine.play_track(track, crossfade).await {
            error!("Skipping file: {}", e);
            continue;
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break 'tracks,
                event = events.next() => {
                    if let (true, Some(Ok(event))) = (args.events_json, &event) {
                        print_event_json(event);
                    }
                    match event {
                        Some(Ok(SoundboardEvent::TrackEnd {
                            track, loops_played, ..
                        })) if track.id == id => {
                            debug!("{} finished after {} loop(s)", track.title, loops_played);
                            continue 'tracks;
                        }
                        Some(Ok(SoundboardEvent::TimeUpdate {
                            track_id,
                            current_time,
                            duration,
                            ..
                        }))
                            if has_next
                                && crossfade_window > 0.0
                                && track_id == id
                                && duration > 0.0
                                && duration - current_time <= crossfade_window =>
                        {
                            continue 'tracks;
                        }
                        Some(Ok(SoundboardEvent::Error { message, .. })) => {
                            warn!("Playback error: {}", message);
                            continue 'tracks;
                        }
                        Some(Ok(event)) => debug!("Event: {}", event.kind().as_str()),
                        Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                            warn!("Event stream lagged, {} event(s) skipped", skipped);
                        }
                        None => break 'tracks,
                    }
                }
            }
        }
    }

    engine.stop();
    update_loop.shutdown().await;
    tracker.detach();

    for id in &track_ids {
        if let Some(track) = store.get(id) {
            info!("{}: played {} time(s)", track.title, track.usage_count);
        }
    }
    info!("Soundboard engine shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(backend) = args.backend {
        config.engine.backend = backend;
    }
    if let Some(device) = &args.device {
        config.engine.device = Some(device.clone());
    }
    if let Some(volume) = args.volume {
        config.audio.volume = Volume::from_percent(volume);
    }
    if let Some(count) = args.loop_count {
        config.audio.loop_enabled = count != 0;
        config.audio.loop_count = count;
    }
}

fn print_event_json(event: &SoundboardEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Cannot serialize {} event: {}", event.kind(), e),
    }
}

/// Track for a local file; duration from the container header when available
fn track_for_file(path: &Path) -> Track {
    let duration = match SimpleDecoder::probe_duration(path) {
        Ok(duration) => duration.unwrap_or(0.0),
        Err(e) => {
            warn!("Cannot read duration of {}: {}", path.display(), e);
            0.0
        }
    };
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Track::with_generated_id(title, duration, path.display().to_string())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
