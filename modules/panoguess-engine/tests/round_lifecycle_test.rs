//! Single-player round lifecycle: search → load → guess → submit/timeout →
//! result → next round or final summary.

mod harness;

use std::time::Duration;

use harness::{config, eventually, prague, single_player, wait_for_phase};
use panoguess_common::{Config, GameError, LatLon, PlayMode, Preferences};
use panoguess_engine::sim::DEFAULT_CAMERA;
use panoguess_engine::testing::{MockViewer, ScriptedOracle, OLD_TOWN, PRAGUE};
use panoguess_engine::traits::{Camera, ViewerHandle};
use panoguess_engine::RoundPhase;

#[tokio::test]
async fn prague_guess_scores_on_second_branch() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);

    // First sample was accepted and the viewer opened at the snapped point
    assert_eq!(game.oracle.calls().len(), 1);
    let call = &game.oracle.calls()[0];
    assert!(PRAGUE.contains(call.lat, call.lon));
    let loads = game.viewer.loads();
    assert_eq!((loads[0].lat, loads[0].lon), OLD_TOWN);
    assert!(loads[0].show_navigation);
    assert_eq!(game.map.fitted(), vec![PRAGUE]);

    game.controller.place_guess(50.08, 14.44).unwrap();
    let record = game.controller.submit_guess().await.unwrap().unwrap();

    let distance = record.distance_km.unwrap();
    assert!((distance - 0.7136).abs() < 0.001, "distance {distance}");
    assert_eq!(record.score, 4286);
    assert!(!record.timed_out);
    assert_eq!(game.map.markers(), vec![LatLon::new(50.08, 14.44)]);
    assert_eq!(game.controller.phase(), RoundPhase::Result(record.clone()));
    assert_eq!(game.controller.summary().total_score, record.score);
}

#[tokio::test]
async fn double_submit_records_one_round() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.1, 14.5).unwrap();

    let (a, b) = tokio::join!(game.controller.submit_guess(), game.controller.submit_guess());
    let submitted: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();
    assert_eq!(submitted.len(), 1);
    assert!(game.controller.submit_guess().await.unwrap().is_none());

    let snapshot = game.controller.snapshot();
    assert_eq!(snapshot.session.history.len(), 1);
    assert_eq!(snapshot.session.total_score, submitted[0].score);
}

#[tokio::test]
async fn submit_without_guess_is_ignored() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    assert!(game.controller.submit_guess().await.unwrap().is_none());
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);
}

#[tokio::test]
async fn guesses_need_an_active_round() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    let err = game.controller.place_guess(50.0, 14.0).unwrap_err();
    assert!(matches!(err, GameError::RoundNotActive(_)));

    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.0, 14.0).unwrap();
    game.controller.submit_guess().await.unwrap();
    assert!(game.controller.place_guess(50.1, 14.1).is_err());
    assert_eq!(game.map.markers().len(), 1);
}

#[tokio::test]
async fn overlapping_starts_run_once() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1).with_delay(Duration::from_millis(20)),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    let (a, b) = tokio::join!(game.controller.start_new_round(), game.controller.start_new_round());
    a.unwrap();
    b.unwrap();
    assert_eq!(game.oracle.calls().len(), 1);
    assert_eq!(game.viewer.loads().len(), 1);
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);

    // The guard is released once the start completes
    game.controller.start_new_round().await.unwrap();
    assert_eq!(game.viewer.loads().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn time_trial_expiry_records_timeout() {
    let prefs = Preferences {
        time_trial: true,
        time_limit_secs: 5,
        ..Preferences::default()
    };
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(prefs),
    );
    game.controller.start_new_round().await.unwrap();
    assert_eq!(game.controller.snapshot().session.time_trial.remaining_secs, 5);

    let phase = wait_for_phase(&game.controller, |p| matches!(p, RoundPhase::Result(_))).await;
    let record = phase.record().unwrap();
    assert!(record.timed_out);
    assert_eq!(record.score, 0);
    assert_eq!(record.guess, None);
    assert_eq!(record.distance_km, None);
    assert_eq!(game.controller.snapshot().session.time_trial.remaining_secs, 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_discards_unsubmitted_guess() {
    let prefs = Preferences {
        time_trial: true,
        time_limit_secs: 3,
        ..Preferences::default()
    };
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(prefs),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.08, 14.44).unwrap();

    let phase = wait_for_phase(&game.controller, |p| matches!(p, RoundPhase::Result(_))).await;
    assert!(phase.record().unwrap().timed_out);
    assert_eq!(phase.record().unwrap().guess, None);
    assert!(game.controller.submit_guess().await.unwrap().is_none());
    assert_eq!(game.controller.summary().rounds.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn submission_stops_the_timer() {
    let prefs = Preferences {
        time_trial: true,
        time_limit_secs: 3,
        ..Preferences::default()
    };
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(prefs),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.08, 14.44).unwrap();
    let record = game.controller.submit_guess().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(game.controller.phase(), RoundPhase::Result(record));
    assert_eq!(game.controller.summary().rounds.len(), 1);
}

#[tokio::test]
async fn rounds_advance_until_final() {
    let config = Config {
        total_rounds: 3,
        ..config()
    };
    let game = single_player(
        config,
        ScriptedOracle::always_at_sample(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    for round in 1..=3 {
        let snapshot = game.controller.snapshot();
        assert_eq!(snapshot.session.round_index, round);
        assert!(snapshot.session.current_guess.is_none());
        let target = snapshot.session.current_target.unwrap();
        game.controller.place_guess(target.lat, target.lon + 0.01).unwrap();
        game.controller.submit_guess().await.unwrap().unwrap();
        game.controller.next_round().await.unwrap();
    }

    let RoundPhase::Final(summary) = game.controller.phase() else {
        panic!("expected final, got {:?}", game.controller.phase());
    };
    assert_eq!(summary.rounds.len(), 3);
    assert_eq!(summary.total_score, summary.rounds.iter().map(|r| r.score).sum::<u32>());
    assert!(game.viewer.handles().iter().all(|h| h.is_destroyed()));
    assert!(matches!(
        game.controller.start_new_round().await,
        Err(GameError::RoundNotActive(_))
    ));
}

#[tokio::test]
async fn infinite_mode_ignores_round_cap() {
    let config = Config {
        total_rounds: 1,
        ..config()
    };
    let prefs = Preferences {
        infinite_mode: true,
        ..Preferences::default()
    };
    let game = single_player(config, ScriptedOracle::always_at_sample(), MockViewer::new(), prague(prefs));
    game.controller.start_new_round().await.unwrap();
    for _ in 0..2 {
        game.controller.place_guess(50.0, 14.5).unwrap();
        game.controller.submit_guess().await.unwrap();
        game.controller.next_round().await.unwrap();
        assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);
    }
    assert_eq!(game.controller.snapshot().session.round_index, 3);

    let summary = game.controller.finish().unwrap();
    assert_eq!(summary.rounds.len(), 2);
    assert!(matches!(game.controller.phase(), RoundPhase::Final(_)));
}

#[tokio::test]
async fn next_round_requires_a_result() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    assert!(matches!(
        game.controller.next_round().await,
        Err(GameError::RoundNotActive(_))
    ));
}

#[tokio::test]
async fn new_round_resets_guess_and_viewer() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    let first = game.viewer.last_handle().unwrap();
    game.controller.place_guess(50.0, 14.5).unwrap();
    game.controller.submit_guess().await.unwrap();
    assert!(!first.is_destroyed());

    game.controller.next_round().await.unwrap();
    assert!(first.is_destroyed());
    let snapshot = game.controller.snapshot();
    assert_eq!(snapshot.session.round_index, 2);
    assert!(snapshot.session.current_guess.is_none());
    assert!(!snapshot.session.round_submitted);
    assert_eq!(game.map.clears(), 2);
}

#[tokio::test]
async fn load_failure_searches_again() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample(),
        MockViewer::new().failing_first(2),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    assert_eq!(game.viewer.loads().len(), 3);
    // Each retry re-runs location acquisition
    assert_eq!(game.oracle.calls().len(), 3);
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);
}

#[tokio::test]
async fn load_retries_are_bounded() {
    let config = Config {
        panorama_load_max_retries: 2,
        ..config()
    };
    let game = single_player(
        config,
        ScriptedOracle::always_at_sample(),
        MockViewer::new().always_failing(),
        prague(Preferences::default()),
    );
    let err = game.controller.start_new_round().await.unwrap_err();
    assert!(matches!(err, GameError::PanoramaLoad(_)));
    assert_eq!(game.viewer.loads().len(), 3);
    assert!(matches!(game.controller.phase(), RoundPhase::LoadFailed(_)));

    // Manual retry is allowed and starts over
    assert!(game.controller.retry().await.is_err());
    assert_eq!(game.viewer.loads().len(), 6);
}

#[tokio::test]
async fn exhausted_search_waits_for_manual_retry() {
    let game = single_player(
        config(),
        ScriptedOracle::never(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    let err = game.controller.start_new_round().await.unwrap_err();
    assert!(matches!(err, GameError::SearchExhausted { attempts: 10 }));

    let RoundPhase::SearchFailed(trace) = game.controller.phase() else {
        panic!("expected search failure");
    };
    assert_eq!(trace.attempts.len(), 10);
    assert!(trace.attempts.iter().all(|a| a.inside && !a.has_panorama));
    assert_eq!(game.oracle.calls().len(), 10);
    assert!(game.viewer.loads().is_empty());

    assert!(game.controller.retry().await.is_err());
    assert_eq!(game.oracle.calls().len(), 20);
}

#[tokio::test]
async fn teardown_discards_in_flight_round() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new().with_delay(Duration::from_millis(50)),
        prague(Preferences::default()),
    );
    let controller = game.controller.clone();
    let start = tokio::spawn(async move { controller.start_new_round().await });

    wait_for_phase(&game.controller, |p| *p == RoundPhase::LoadingPanorama).await;
    game.controller.teardown();
    start.await.unwrap().unwrap();

    assert_eq!(game.controller.phase(), RoundPhase::Idle);
    let snapshot = game.controller.snapshot();
    assert!(snapshot.session.current_target.is_none());
    assert!(snapshot.session.history.is_empty());
    // The late panorama was destroyed instead of installed
    let late = game.viewer.last_handle().unwrap();
    assert!(late.is_destroyed());

    // A fresh game can start right away
    game.controller.start_new_round().await.unwrap();
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);
}

#[tokio::test]
async fn play_again_starts_a_fresh_session() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.0, 14.5).unwrap();
    game.controller.submit_guess().await.unwrap();
    game.controller.finish().unwrap();

    game.controller.play_again().await.unwrap();
    let snapshot = game.controller.snapshot();
    assert_eq!(snapshot.phase, RoundPhase::AwaitingGuess);
    assert_eq!(snapshot.session.round_index, 1);
    assert_eq!(snapshot.session.total_score, 0);
}

#[tokio::test]
async fn camera_lock_restores_baseline() {
    let prefs = Preferences {
        turn_around: false,
        zoom: false,
        ..Preferences::default()
    };
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(prefs),
    );
    game.controller.start_new_round().await.unwrap();
    let handle = game.viewer.last_handle().unwrap();

    for yaw in [45.0, 90.0, 180.0] {
        handle.look(Camera {
            yaw,
            pitch: 10.0,
            fov: 0.6,
        });
        eventually(|| handle.camera() == DEFAULT_CAMERA).await;
    }
}

#[tokio::test]
async fn unlocked_camera_moves_freely() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    let handle = game.viewer.last_handle().unwrap();
    let moved = Camera {
        yaw: 45.0,
        ..DEFAULT_CAMERA
    };
    handle.look(moved);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.camera(), moved);
}

#[tokio::test]
async fn explorer_scores_against_walked_position() {
    let prefs = Preferences {
        target_original: false,
        ..Preferences::default()
    };
    let game = single_player(
        config(),
        ScriptedOracle::found_at(50.0, 14.3),
        MockViewer::new(),
        prague(prefs),
    );
    game.controller.start_new_round().await.unwrap();
    let handle = game.viewer.last_handle().unwrap();
    handle.walk_to(OLD_TOWN.0, OLD_TOWN.1);
    eventually(|| game.controller.snapshot().session.live_position.is_some()).await;

    game.controller.place_guess(50.08, 14.44).unwrap();
    let record = game.controller.submit_guess().await.unwrap().unwrap();
    assert_eq!(record.target.point(), LatLon::new(OLD_TOWN.0, OLD_TOWN.1));
    assert_eq!(record.score, 4286);
}

#[tokio::test]
async fn static_mode_scores_original_location() {
    let prefs = Preferences {
        target_original: false,
        ..Preferences::default()
    };
    let mut local = prague(prefs);
    local.mode = PlayMode::Static;
    let game = single_player(config(), ScriptedOracle::found_at(50.0, 14.3), MockViewer::new(), local);
    game.controller.start_new_round().await.unwrap();
    assert!(!game.viewer.loads()[0].show_navigation);

    game.viewer.last_handle().unwrap().walk_to(OLD_TOWN.0, OLD_TOWN.1);
    eventually(|| game.controller.snapshot().session.live_position.is_some()).await;
    game.controller.place_guess(50.0, 14.3).unwrap();
    let record = game.controller.submit_guess().await.unwrap().unwrap();
    assert_eq!(record.target.point(), LatLon::new(50.0, 14.3));
    assert_eq!(record.score, 5000);
}

#[tokio::test]
async fn viewer_snap_refines_target() {
    let game = single_player(
        config(),
        ScriptedOracle::found_at(OLD_TOWN.0, OLD_TOWN.1),
        MockViewer::new().snap_to(50.0805, 14.4302),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    let target = game.controller.snapshot().session.current_target.unwrap();
    assert_eq!(target.point(), LatLon::new(50.0805, 14.4302));
}

#[tokio::test]
async fn settings_are_read_at_round_start() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample(),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.set_mode(PlayMode::Static);
    assert_eq!(game.controller.snapshot().settings.mode, PlayMode::Explorer);

    game.controller.place_guess(50.0, 14.5).unwrap();
    game.controller.submit_guess().await.unwrap();
    game.controller.next_round().await.unwrap();
    assert_eq!(game.controller.snapshot().settings.mode, PlayMode::Static);
    assert!(!game.viewer.loads()[1].show_navigation);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_move_one_round() {
    let game = single_player(
        config(),
        ScriptedOracle::always_at_sample().with_delay(Duration::from_millis(10)),
        MockViewer::new(),
        prague(Preferences::default()),
    );
    game.controller.start_new_round().await.unwrap();
    game.controller.place_guess(50.0, 14.5).unwrap();
    game.controller.submit_guess().await.unwrap();

    let advances: Vec<_> = (0..4)
        .map(|_| {
            let controller = game.controller.clone();
            tokio::spawn(async move { controller.next_round().await })
        })
        .collect();
    let mut accepted = 0;
    for advance in advances {
        match advance.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(e) => assert!(matches!(e, GameError::RoundNotActive(_))),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(game.controller.snapshot().session.round_index, 2);
    assert_eq!(game.controller.phase(), RoundPhase::AwaitingGuess);
}
