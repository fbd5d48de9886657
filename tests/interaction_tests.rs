mod common;

use ar_tv::{
    CoordinatorConfig, IgnoredTap, InteractionState, Material, PlaybackError, PlaybackState,
    RebindPolicy, TapOutcome, TextureId, VideoId,
};
use common::{
    EMPTY_CORNER, EngineEvent, EventLog, SCREEN_CENTRE, anchored_session, camera, session_with,
    wall,
};

fn id(s: &str) -> VideoId {
    VideoId::from(s)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn scenario_a_tap_starts_selected_video() {
    init_logging();
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));

    let outcome = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(outcome, TapOutcome::Started(id("1")));
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
    assert_eq!(session.bound_video(), Some(&id("1")));
    let screen = session.tv().unwrap().screen;
    assert_eq!(
        session.scene().material(screen),
        Some(Material::Video { texture: TextureId(1) })
    );
}

#[test]
fn scenario_b_and_c_retap_pauses_then_resumes_without_rebinding() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    let paused = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    assert_eq!(paused, TapOutcome::Paused(id("1")));
    assert_eq!(session.current_state(), InteractionState::BoundPaused);
    assert_eq!(session.bound_video(), Some(&id("1")));

    let resumed = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    assert_eq!(resumed, TapOutcome::Resumed(id("1")));
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);

    assert_eq!(
        log.events(),
        vec![
            EngineEvent::Opened { video: "1".into(), texture: 1 },
            EngineEvent::Play(1),
            EngineEvent::Pause(1),
            EngineEvent::Play(1),
        ]
    );
}

#[test]
fn scenario_d_unresolvable_selection_stays_unbound() {
    let log = EventLog::default();
    let mut session = session_with(CoordinatorConfig::default(), &["1"], &log);
    session.on_plane_detected(&wall(1)).unwrap();
    session.on_select(id("2"));
    let screen = session.tv().unwrap().screen;
    let material = session.scene().material(screen);

    let err = session.on_tap(SCREEN_CENTRE, &camera()).unwrap_err();

    assert_eq!(err, PlaybackError::SourceNotFound(id("2")));
    assert_eq!(session.current_state(), InteractionState::Unbound);
    assert_eq!(session.scene().material(screen), material);
    assert!(log.events().is_empty());
}

#[test]
fn scenario_e_selection_change_rebinds_on_next_tap() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    session.on_select(id("2"));
    let outcome = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(
        outcome,
        TapOutcome::Rebound { released: id("1"), bound: id("2") }
    );
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
    assert_eq!(session.bound_video(), Some(&id("2")));
    assert_eq!(log.released(), vec![1]);
    assert_eq!(log.events().last(), Some(&EngineEvent::Play(2)));
}

#[test]
fn legacy_policy_keeps_toggling_the_bound_video() {
    let log = EventLog::default();
    let config = CoordinatorConfig { rebind: RebindPolicy::ToggleBound };
    let mut session = session_with(config, &["1", "2"], &log);
    session.on_plane_detected(&wall(1)).unwrap();
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    session.on_select(id("2"));
    assert_eq!(session.on_tap(SCREEN_CENTRE, &camera()).unwrap(), TapOutcome::Paused(id("1")));
    assert_eq!(session.on_tap(SCREEN_CENTRE, &camera()).unwrap(), TapOutcome::Resumed(id("1")));
    assert!(log.released().is_empty());
}

#[test]
fn double_toggle_restores_state_and_binding() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("3"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    let screen = session.tv().unwrap().screen;
    let before_state = session.current_state();
    let before_material = session.scene().material(screen);
    let before_video = session.bound_video().cloned();

    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(session.current_state(), before_state);
    assert_eq!(session.scene().material(screen), before_material);
    assert_eq!(session.bound_video().cloned(), before_video);
    assert_eq!(
        session.coordinator().binder().current_session(screen).map(|s| s.state()),
        Some(PlaybackState::Paused)
    );
}

#[test]
fn at_most_one_session_is_ever_bound() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    let screen = session.tv().unwrap().screen;

    for (n, video) in ["1", "2", "3", "1", "2"].into_iter().enumerate() {
        session.on_select(id(video));
        session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
        assert_eq!(session.coordinator().binder().bound_count(), 1);
        assert_eq!(log.released().len(), n);
    }
    // Every release targets the session bound just before it.
    assert_eq!(log.released(), vec![1, 2, 3, 4]);
    assert_eq!(
        session.scene().material(screen),
        Some(Material::Video { texture: TextureId(5) })
    );
}

#[test]
fn missed_taps_never_change_state() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));

    assert_eq!(
        session.on_tap(EMPTY_CORNER, &camera()).unwrap(),
        TapOutcome::Ignored(IgnoredTap::Miss)
    );
    assert_eq!(session.current_state(), InteractionState::Unbound);

    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_tap(EMPTY_CORNER, &camera()).unwrap();
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
}

#[test]
fn taps_on_the_housing_are_ignored() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    let housing = session.tv().unwrap().housing;

    let (scene, coordinator) = session.parts_mut();
    let outcome = coordinator.on_tap(scene, Some(housing)).unwrap();

    assert_eq!(outcome, TapOutcome::Ignored(IgnoredTap::NotScreen));
    assert_eq!(session.current_state(), InteractionState::Unbound);
}

#[test]
fn taps_before_any_surface_are_inert() {
    let log = EventLog::default();
    let mut session = session_with(CoordinatorConfig::default(), &["1"], &log);
    session.on_select(id("1"));

    assert_eq!(
        session.on_tap(SCREEN_CENTRE, &camera()).unwrap(),
        TapOutcome::Ignored(IgnoredTap::NoSurface)
    );
    assert!(session.tv().is_none());
    assert!(log.events().is_empty());
}

#[test]
fn failed_rebind_keeps_previous_session_in_its_state() {
    let log = EventLog::default();
    let mut session = session_with(CoordinatorConfig::default(), &["1"], &log);
    session.on_plane_detected(&wall(1)).unwrap();
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    assert_eq!(session.current_state(), InteractionState::BoundPaused);

    session.on_select(id("9"));
    let err = session.on_tap(SCREEN_CENTRE, &camera()).unwrap_err();

    assert_eq!(err, PlaybackError::SourceNotFound(id("9")));
    assert_eq!(session.current_state(), InteractionState::BoundPaused);
    assert_eq!(session.bound_video(), Some(&id("1")));
    assert!(log.released().is_empty());
}

#[test]
fn selection_change_while_paused_rebinds_and_plays() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    assert_eq!(session.on_tap(SCREEN_CENTRE, &camera()).unwrap(), TapOutcome::Paused(id("1")));

    session.on_select(id("2"));
    let outcome = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(
        outcome,
        TapOutcome::Rebound { released: id("1"), bound: id("2") }
    );
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
    assert_eq!(session.bound_video(), Some(&id("2")));
    assert_eq!(log.released(), vec![1]);
    let screen = session.tv().unwrap().screen;
    assert_eq!(
        session.scene().material(screen),
        Some(Material::Video { texture: TextureId(2) })
    );
}

#[test]
fn tap_after_the_video_ended_plays_it_again() {
    init_logging();
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    log.finish(1);
    assert_eq!(session.current_state(), InteractionState::BoundPaused);

    let outcome = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    assert_eq!(outcome, TapOutcome::Replayed(id("1")));
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
    assert_eq!(session.bound_video(), Some(&id("1")));
    assert_eq!(log.released(), vec![1]);
    assert_eq!(log.events().last(), Some(&EngineEvent::Play(2)));

    // The fresh session toggles normally again.
    assert_eq!(session.on_tap(SCREEN_CENTRE, &camera()).unwrap(), TapOutcome::Paused(id("1")));
}

#[test]
fn ended_video_under_legacy_policy_plays_the_selection() {
    let log = EventLog::default();
    let config = CoordinatorConfig { rebind: RebindPolicy::ToggleBound };
    let mut session = session_with(config, &["1", "2"], &log);
    session.on_plane_detected(&wall(1)).unwrap();
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_select(id("2"));

    log.finish(1);
    let outcome = session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(
        outcome,
        TapOutcome::Rebound { released: id("1"), bound: id("2") }
    );
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
}

#[test]
fn engine_open_failure_is_reported_and_changes_nothing() {
    let log = EventLog::default();
    let mut session = ar_tv::ArSession::new(
        CoordinatorConfig::default(),
        Box::new(common::ScriptedResolver::new(&["1", "2"])),
        Box::new(common::ScriptedBackend::new(log.clone()).with_broken(&["2"])),
    );
    session.on_plane_detected(&wall(1)).unwrap();
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    session.on_select(id("2"));
    let err = session.on_tap(SCREEN_CENTRE, &camera()).unwrap_err();
    assert!(matches!(err, PlaybackError::Engine { ref id, .. } if id.as_str() == "2"));
    assert_eq!(session.current_state(), InteractionState::BoundPlaying);
    assert_eq!(session.bound_video(), Some(&id("1")));
}

#[test]
fn tapping_without_a_selection_reports_it() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    assert_eq!(
        session.on_tap(SCREEN_CENTRE, &camera()).unwrap_err(),
        PlaybackError::NoSelection
    );
    assert_eq!(session.current_state(), InteractionState::Unbound);
}

#[test]
fn selection_alone_never_touches_playback() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    let events = log.events();
    let screen = session.tv().unwrap().screen;
    let revision = session.scene().revision();

    for video in ["2", "3", "missing", "1"] {
        session.on_select(id(video));
    }

    assert_eq!(log.events(), events);
    assert_eq!(session.current_state(), InteractionState::BoundPaused);
    assert_eq!(session.bound_video(), Some(&id("1")));
    assert_eq!(session.scene().revision(), revision);
    assert!(session.scene().material(screen).unwrap().is_video());
}

#[test]
fn losing_the_surface_releases_playback_and_allows_respawn() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert!(session.on_plane_lost(ar_tv::PlaneId(1)));
    assert!(session.tv().is_none());
    assert_eq!(session.current_state(), InteractionState::Unbound);
    assert_eq!(log.released(), vec![1]);
    assert!(session.scene().is_empty());

    let tv = session.on_plane_detected(&wall(2)).expect("fresh tv on new wall");
    assert_eq!(session.tv(), Some(tv));
    assert_eq!(session.on_tap(SCREEN_CENTRE, &camera()).unwrap(), TapOutcome::Started(id("1")));
}

#[test]
fn stop_turns_the_screen_off() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    session.on_select(id("2"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();

    assert_eq!(session.stop(), Some(id("2")));
    let screen = session.tv().unwrap().screen;
    assert_eq!(session.scene().material(screen), Some(ar_tv::tv::screen_off_material()));
    assert_eq!(session.current_state(), InteractionState::Unbound);
}

#[test]
fn frames_come_from_the_bound_session() {
    let log = EventLog::default();
    let mut session = anchored_session(&log);
    assert!(session.poll_frame().is_none());

    session.on_select(id("1"));
    session.on_tap(SCREEN_CENTRE, &camera()).unwrap();
    let (texture, frame) = session.poll_frame().unwrap();
    assert_eq!(texture, TextureId(1));
    assert_eq!((frame.width, frame.height), (2, 1));
    assert!(session.poll_frame().is_none());
}
