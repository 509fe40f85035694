//! Playback control: play, pause/resume, stop, seek, volume, natural end

mod helpers;

use helpers::{count, track, TestRig};
use soundboard_engine::{EngineState, EventKind, SoundboardEvent};

#[tokio::test]
async fn test_play_pause_resume_keeps_track() {
    let rig = TestRig::new();
    rig.engine.play_track(track("t1", 5.0), false).await.unwrap();

    rig.engine.pause();
    assert_eq!(rig.engine.state(), EngineState::Paused);
    assert!(!rig.engine.is_track_playing());

    rig.engine.resume().unwrap();
    let state = rig.engine.current_state();
    assert!(state.is_playing);
    assert_eq!(state.current_track.map(|t| t.id), Some("t1".to_string()));
}

#[tokio::test]
async fn test_play_emits_loading_track_change_playing() {
    let rig = TestRig::new();
    rig.engine.play_track(track("t1", 5.0), false).await.unwrap();

    let events = rig.take_events();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::PlayStateChange, EventKind::TrackChange, EventKind::PlayStateChange]
    );
    assert!(matches!(
        events[0],
        SoundboardEvent::PlayStateChange { state: EngineState::Loading, .. }
    ));
    assert!(matches!(
        &events[1],
        SoundboardEvent::TrackChange { track, crossfade: false, previous_track_id: None, .. } if track.id == "t1"
    ));
    assert!(matches!(
        events[2],
        SoundboardEvent::PlayStateChange { state: EngineState::Playing, is_playing: true, .. }
    ));
}

#[tokio::test]
async fn test_second_play_displaces_first_once() {
    let rig = TestRig::new();
    let stops_a = rig.count_stops("a");

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.engine.play_track(track("b", 5.0), false).await.unwrap();

    assert_eq!(count(&stops_a), 1);
    assert_eq!(rig.engine.current_track().map(|t| t.id), Some("b".to_string()));
    assert_eq!(rig.engine.active_ramps(), 0);
    assert_eq!(rig.backend.live_sources(), 1);
    // listener is removed after firing
    assert_eq!(rig.engine.stop_listener_count(), 0);

    let changes = rig.take_events_of(EventKind::TrackChange);
    assert!(matches!(
        changes.last(),
        Some(SoundboardEvent::TrackChange { previous_track_id: Some(prev), .. }) if prev == "a"
    ));
}

#[tokio::test]
async fn test_replaying_same_track_restarts_it() {
    let rig = TestRig::new();
    let stops = rig.count_stops("a");
    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.advance(2.0);

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();

    assert_eq!(count(&stops), 1);
    assert_eq!(rig.engine.current_state().current_time, 0.0);
    assert!(rig.engine.is_track_playing());
}

#[tokio::test]
async fn test_stop_clears_track_and_fires_listener() {
    let rig = TestRig::new();
    let stops = rig.count_stops("a");
    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.advance(1.0);

    rig.engine.stop();

    let state = rig.engine.current_state();
    assert_eq!(state.state, EngineState::Idle);
    assert!(state.current_track.is_none());
    assert_eq!(state.current_time, 0.0);
    assert_eq!(count(&stops), 1);
    assert_eq!(rig.backend.live_sources(), 0);

    // a second stop has nothing left to displace
    rig.engine.stop();
    assert_eq!(count(&stops), 1);
}

#[tokio::test]
async fn test_pause_and_resume_are_noops_in_wrong_state() {
    let rig = TestRig::new();
    rig.engine.pause();
    rig.engine.resume().unwrap();
    assert_eq!(rig.engine.state(), EngineState::Idle);
    assert!(rig.take_events().is_empty());

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.take_events();
    rig.engine.resume().unwrap();
    rig.engine.pause();
    rig.engine.pause();
    let changes = rig.take_events_of(EventKind::PlayStateChange);
    assert_eq!(changes.len(), 1);
}

#[tokio::test]
async fn test_pause_freezes_position() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.advance(1.5);
    rig.engine.pause();
    rig.advance(3.0);

    assert_eq!(rig.engine.current_state().current_time, 1.5);
    rig.engine.resume().unwrap();
    rig.advance(0.5);
    assert_eq!(rig.engine.current_state().current_time, 2.0);
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let rig = TestRig::new();
    rig.engine.set_volume(150.0);
    assert_eq!(rig.engine.volume(), 100.0);

    rig.engine.set_volume(-3.0);
    assert_eq!(rig.engine.volume(), 0.0);

    rig.engine.set_volume(50.0);
    assert!((rig.engine.volume() - 50.0).abs() < 1e-3);
    assert_eq!(rig.take_events_of(EventKind::VolumeChange).len(), 3);
}

#[tokio::test]
async fn test_volume_reaches_device() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.engine.set_volume(25.0);

    let device = rig.engine.device_volume().unwrap();
    assert!((device - 0.25).abs() < 1e-6);
}

#[tokio::test]
async fn test_seek_clamps_to_duration() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 3.0), false).await.unwrap();
    rig.take_events();

    rig.engine.seek_to(100.0);
    assert_eq!(rig.engine.current_state().current_time, 3.0);

    rig.engine.seek_to(-5.0);
    assert_eq!(rig.engine.current_state().current_time, 0.0);

    rig.engine.seek_to(1.25);
    assert_eq!(rig.engine.current_state().current_time, 1.25);

    let updates = rig.take_events_of(EventKind::TimeUpdate);
    assert_eq!(updates.len(), 3);
    assert!(matches!(
        updates[2],
        SoundboardEvent::TimeUpdate { current_time, duration, .. } if current_time == 1.25 && duration == 3.0
    ));
}

#[tokio::test]
async fn test_seek_without_track_is_silent() {
    let rig = TestRig::new();
    rig.engine.seek_to(2.0);
    assert!(rig.take_events().is_empty());
    assert_eq!(rig.engine.current_state().current_time, 0.0);
}

#[tokio::test]
async fn test_natural_end_goes_idle_and_keeps_track() {
    let rig = TestRig::new();
    let stops = rig.count_stops("a");
    rig.engine.play_track(track("a", 1.0), false).await.unwrap();
    rig.take_events();

    rig.advance(1.0);

    let state = rig.engine.current_state();
    assert_eq!(state.state, EngineState::Idle);
    assert!(!state.is_playing);
    assert_eq!(state.current_track.map(|t| t.id), Some("a".to_string()));
    assert_eq!(count(&stops), 0);

    let ends = rig.take_events_of(EventKind::TrackEnd);
    assert_eq!(ends.len(), 1);
    assert!(matches!(&ends[0], SoundboardEvent::TrackEnd { loops_played: 0, .. }));

    // further ticks do not report the end again
    rig.advance(1.0);
    assert!(rig.take_events_of(EventKind::TrackEnd).is_empty());
}

#[tokio::test]
async fn test_resume_after_end_restarts_from_zero() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 1.0), false).await.unwrap();
    rig.advance(1.0);
    assert_eq!(rig.engine.state(), EngineState::Idle);

    rig.engine.resume().unwrap();
    assert_eq!(rig.engine.state(), EngineState::Playing);
    assert_eq!(rig.engine.current_state().current_time, 0.0);

    rig.advance(0.5);
    assert_eq!(rig.engine.current_state().current_time, 0.5);
}

#[tokio::test]
async fn test_time_updates_are_paced() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.take_events();

    rig.engine.tick();
    rig.advance(0.125);
    rig.advance(0.125);
    rig.advance(0.125);

    let updates = rig.take_events_of(EventKind::TimeUpdate);
    let times: Vec<f64> = updates
        .iter()
        .map(|e| match e {
            SoundboardEvent::TimeUpdate { current_time, .. } => *current_time,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(times, vec![0.0, 0.25]);

    rig.engine.pause();
    rig.advance(1.0);
    assert!(rig.take_events_of(EventKind::TimeUpdate).is_empty());
}

#[tokio::test]
async fn test_stop_listener_can_call_back_into_engine() {
    let rig = TestRig::new();
    let engine = std::sync::Arc::downgrade(&rig.engine);
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen_in_listener = std::sync::Arc::clone(&seen);
    rig.engine.register_stop_listener("a", move || {
        if let Some(engine) = engine.upgrade() {
            *seen_in_listener.lock().unwrap() = engine.current_track().map(|t| t.id);
        }
    });

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.engine.play_track(track("b", 5.0), false).await.unwrap();

    // the listener ran after the engine switched to b
    assert_eq!(seen.lock().unwrap().clone(), Some("b".to_string()));
}

#[tokio::test]
async fn test_reregistering_listener_replaces_it() {
    let rig = TestRig::new();
    let first = rig.count_stops("a");
    let second = rig.count_stops("a");

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.engine.stop();

    assert_eq!(count(&first), 0);
    assert_eq!(count(&second), 1);
}

#[tokio::test]
async fn test_unregistered_listener_does_not_fire() {
    let rig = TestRig::new();
    let stops = rig.count_stops("a");
    assert!(rig.engine.unregister_stop_listener("a"));

    rig.engine.play_track(track("a", 5.0), false).await.unwrap();
    rig.engine.stop();
    assert_eq!(count(&stops), 0);
}
