//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use panoguess_common::protocol::ServerMessage;
use panoguess_common::{Config, PlayMode, Preferences, RegionSelection};
use panoguess_engine::testing::{
    bounds_only_catalog, test_config, LoopbackRelay, MockViewer, RecordingMap, ScriptedOracle,
};
use panoguess_engine::traits::Transport;
use panoguess_engine::{GameDeps, LocalSettings, LocationSampler, RoundController, RoundPhase, SessionReconciler};

pub const SEED: u64 = 11;

pub struct Game {
    pub controller: RoundController,
    pub oracle: Arc<ScriptedOracle>,
    pub viewer: Arc<MockViewer>,
    pub map: Arc<RecordingMap>,
}

pub fn prague(preferences: Preferences) -> LocalSettings {
    LocalSettings {
        preferences,
        region: RegionSelection::Preset("prague".into()),
        mode: PlayMode::Explorer,
    }
}

pub fn single_player(config: Config, oracle: ScriptedOracle, viewer: MockViewer, local: LocalSettings) -> Game {
    build(config, oracle, viewer, local, None)
}

pub fn multiplayer_client(
    config: Config,
    relay: &Arc<LoopbackRelay>,
    oracle: ScriptedOracle,
    viewer: MockViewer,
) -> (Game, Arc<SessionReconciler>) {
    let (game, reconciler) = multiplayer_over(config, relay.clone(), oracle, viewer);
    relay.register(&reconciler);
    (game, reconciler)
}

/// Multiplayer client on an arbitrary transport.
pub fn multiplayer_over(
    config: Config,
    transport: Arc<dyn Transport>,
    oracle: ScriptedOracle,
    viewer: MockViewer,
) -> (Game, Arc<SessionReconciler>) {
    let reconciler = Arc::new(SessionReconciler::new(transport, &config));
    let game = build(config, oracle, viewer, prague(Preferences::default()), Some(reconciler.clone()));
    (game, reconciler)
}

fn build(
    config: Config,
    oracle: ScriptedOracle,
    viewer: MockViewer,
    local: LocalSettings,
    reconciler: Option<Arc<SessionReconciler>>,
) -> Game {
    let oracle = Arc::new(oracle);
    let viewer = Arc::new(viewer);
    let map = Arc::new(RecordingMap::new());
    let keys = Arc::new(config.key_ring());
    let deps = GameDeps::builder()
        .oracle(oracle.clone())
        .viewer(viewer.clone())
        .map(map.clone())
        .catalog(bounds_only_catalog())
        .keys(keys.clone())
        .reconciler(reconciler)
        .build();
    let sampler = LocationSampler::new(&config, keys).with_seed(SEED);
    Game {
        controller: RoundController::with_sampler(config, deps, local, sampler),
        oracle,
        viewer,
        map,
    }
}

pub fn config() -> Config {
    test_config()
}

/// Wait until the controller's phase satisfies `pred`.
pub async fn wait_for_phase(controller: &RoundController, pred: impl Fn(&RoundPhase) -> bool) -> RoundPhase {
    let mut rx = controller.subscribe_phase();
    let phase = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|p| pred(p)))
        .await
        .expect("timed out waiting for phase")
        .expect("phase channel closed")
        .clone();
    phase
}

/// Poll `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}

pub async fn send(controller: &RoundController, message: ServerMessage) {
    controller
        .handle_server_message(message)
        .await
        .expect("server message rejected");
}
