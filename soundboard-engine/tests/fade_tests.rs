//! Fade-in, fade-out and fade-to-stop envelopes

mod helpers;

use helpers::{count, track, TestRig};
use soundboard_engine::{
    AudioSettings, EngineState, EventKind, FadeCurve, FadeDirection, SoundboardEvent,
};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[tokio::test]
async fn test_fade_in_ramps_to_configured_volume() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.take_events();

    rig.engine.fade_in(2.0);
    assert_eq!(rig.engine.active_ramps(), 1);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.0));
    let started = rig.take_events_of(EventKind::FadeStart);
    assert!(matches!(
        &started[..],
        [SoundboardEvent::FadeStart { direction: FadeDirection::In, from, to, .. }]
            if from.is_silent() && approx(to.as_unit(), 0.8)
    ));

    rig.advance(1.0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.4));

    rig.advance(1.0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
    assert_eq!(rig.engine.active_ramps(), 0);
    assert_eq!(rig.take_events_of(EventKind::FadeComplete).len(), 1);
}

#[tokio::test]
async fn test_fade_in_zero_is_immediate_set() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.fade_in(2.0);
    rig.advance(1.0);
    rig.take_events();

    rig.engine.fade_in(0.0);

    assert_eq!(rig.engine.active_ramps(), 0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
    let events = rig.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        SoundboardEvent::VolumeChange { volume, .. } if approx(volume.as_unit(), 0.8)
    ));
}

#[tokio::test]
async fn test_fade_in_negative_and_nan_are_immediate() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();

    rig.engine.fade_in(-1.0);
    assert_eq!(rig.engine.active_ramps(), 0);
    rig.engine.fade_in(f64::NAN);
    assert_eq!(rig.engine.active_ramps(), 0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
}

#[tokio::test]
async fn test_fade_out_pauses_and_restores_volume() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.take_events();

    rig.engine.fade_out(1.0);
    rig.advance(0.5);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.4));
    assert_eq!(rig.engine.state(), EngineState::Playing);

    rig.advance(0.5);
    assert_eq!(rig.engine.state(), EngineState::Paused);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
    assert_eq!(rig.engine.current_track().map(|t| t.id), Some("a".to_string()));

    let completes = rig.take_events_of(EventKind::FadeComplete);
    assert!(matches!(
        &completes[..],
        [SoundboardEvent::FadeComplete { direction: FadeDirection::Out, .. }]
    ));
}

#[tokio::test]
async fn test_fade_out_zero_pauses_immediately() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();

    rig.engine.fade_out(0.0);

    assert_eq!(rig.engine.state(), EngineState::Paused);
    assert_eq!(rig.engine.active_ramps(), 0);
}

#[tokio::test]
async fn test_fade_out_requires_playing() {
    let rig = TestRig::new();
    rig.engine.fade_out(1.0);
    assert_eq!(rig.engine.active_ramps(), 0);
    assert!(rig.take_events().is_empty());
}

#[tokio::test]
async fn test_new_ramp_cancels_pending_one() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.fade_in(2.0);
    rig.advance(1.0);
    rig.take_events();

    rig.engine.fade_out(1.0);

    assert_eq!(rig.engine.active_ramps(), 1);
    // picks up where the fade-in stood
    assert!(approx(rig.engine.device_volume().unwrap(), 0.4));
    let started = rig.take_events_of(EventKind::FadeStart);
    assert!(matches!(
        &started[..],
        [SoundboardEvent::FadeStart { direction: FadeDirection::Out, from, .. }] if approx(from.as_unit(), 0.4)
    ));

    rig.advance(1.0);
    assert_eq!(rig.engine.state(), EngineState::Paused);
    // the cancelled fade-in never completes
    assert!(!rig
        .take_events_of(EventKind::FadeComplete)
        .iter()
        .any(|e| matches!(e, SoundboardEvent::FadeComplete { direction: FadeDirection::In, .. })));
}

#[tokio::test]
async fn test_set_volume_during_fade_in() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.fade_in(2.0);

    rig.engine.set_volume(50.0);
    // the ramp still owns the device
    assert!(approx(rig.engine.device_volume().unwrap(), 0.0));

    rig.advance(2.0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.5));
}

#[tokio::test]
async fn test_pause_during_fade_restores_volume() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.fade_in(2.0);
    rig.advance(1.0);

    rig.engine.pause();

    assert_eq!(rig.engine.active_ramps(), 0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
}

#[tokio::test]
async fn test_configured_fade_in_on_play() {
    let rig = TestRig::with_settings(AudioSettings {
        fade_in_duration: 1.0,
        ..AudioSettings::default()
    });
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();

    assert_eq!(rig.engine.active_ramps(), 1);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.0));
    assert_eq!(rig.take_events_of(EventKind::FadeStart).len(), 1);

    rig.advance_by_steps(1.0, 0.25);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));
    assert_eq!(rig.engine.active_ramps(), 0);
}

#[tokio::test]
async fn test_exponential_curve_shapes_ramp() {
    let rig = TestRig::with_settings(AudioSettings {
        fade_curve: FadeCurve::Exponential,
        ..AudioSettings::default()
    });
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.fade_in(2.0);

    rig.advance(1.0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.2));
}

#[tokio::test]
async fn test_stop_with_fade_stops_after_fade_out_duration() {
    let rig = TestRig::new(); // fade_out_duration = 1.0
    let stops = rig.count_stops("a");
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();

    rig.engine.stop_with_fade();
    rig.advance(0.5);
    assert_eq!(rig.engine.state(), EngineState::Playing);
    assert_eq!(count(&stops), 0);

    rig.advance(0.5);
    assert_eq!(rig.engine.state(), EngineState::Idle);
    assert!(rig.engine.current_track().is_none());
    assert_eq!(count(&stops), 1);
}

#[tokio::test]
async fn test_stop_with_fade_when_paused_is_immediate() {
    let rig = TestRig::new();
    let stops = rig.count_stops("a");
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.pause();

    rig.engine.stop_with_fade();

    assert_eq!(rig.engine.state(), EngineState::Idle);
    assert_eq!(count(&stops), 1);
}

#[tokio::test]
async fn test_play_during_fade_out_cancels_it() {
    let rig = TestRig::new();
    rig.engine.play_track(track("a", 10.0), false).await.unwrap();
    rig.engine.stop_with_fade();
    rig.advance(0.5);

    rig.engine.play_track(track("b", 10.0), false).await.unwrap();
    assert_eq!(rig.engine.active_ramps(), 0);
    assert!(approx(rig.engine.device_volume().unwrap(), 0.8));

    rig.advance(1.0);
    assert_eq!(rig.engine.state(), EngineState::Playing);
    assert_eq!(rig.engine.current_track().map(|t| t.id), Some("b".to_string()));
}
