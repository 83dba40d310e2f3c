//! Round lifecycle controller.
//!
//! ```text
//! Idle → SearchingLocation → LoadingPanorama → AwaitingGuess → [Submitted] → Result → next | Final
//!              ↓                    ↓
//!        SearchFailed          LoadFailed
//! ```
//!
//! All session mutations happen inside one synchronous critical section
//! between suspension points. Every round start takes a new epoch; an async
//! result that resolves after its epoch was superseded (new round, teardown,
//! server directive) is discarded instead of applied.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use panoguess_common::protocol::ServerMessage;
use panoguess_common::{
    ApiKeyRing, Config, EffectiveSettings, FinalSummary, GameError, GameSettings, LatLon, PlayMode,
    Preferences, Region, RegionSelection, RoundRecord, TargetLocation,
};

use crate::camera::CameraLock;
use crate::catalog::RegionCatalog;
use crate::reconciler::{SessionReconciler, SharedLocation};
use crate::sampler::{LocationSampler, SearchOutcome, SearchTrace};
use crate::session::GameSession;
use crate::timer::spawn_ticker;
use crate::traits::{LoadRequest, MapWidget, PanoramaOracle, PanoramaViewer, ViewerEvent, ViewerHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum RoundPhase {
    Idle,
    SearchingLocation,
    LoadingPanorama,
    AwaitingGuess,
    /// Own guess is in; the relay has not ended the round yet.
    Submitted(RoundRecord),
    Result(RoundRecord),
    Final(FinalSummary),
    /// Search budget exhausted. Manual retry only.
    SearchFailed(Arc<SearchTrace>),
    LoadFailed(String),
}

impl RoundPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Idle => "idle",
            RoundPhase::SearchingLocation => "searching_location",
            RoundPhase::LoadingPanorama => "loading_panorama",
            RoundPhase::AwaitingGuess => "awaiting_guess",
            RoundPhase::Submitted(_) => "submitted",
            RoundPhase::Result(_) => "result",
            RoundPhase::Final(_) => "final",
            RoundPhase::SearchFailed(_) => "search_failed",
            RoundPhase::LoadFailed(_) => "load_failed",
        }
    }

    pub fn record(&self) -> Option<&RoundRecord> {
        match self {
            RoundPhase::Submitted(r) | RoundPhase::Result(r) => Some(r),
            _ => None,
        }
    }
}

/// Long-lived collaborators of a game.
#[derive(Clone, TypedBuilder)]
pub struct GameDeps {
    pub oracle: Arc<dyn PanoramaOracle>,
    pub viewer: Arc<dyn PanoramaViewer>,
    pub map: Arc<dyn MapWidget>,
    pub catalog: Arc<RegionCatalog>,
    pub keys: Arc<ApiKeyRing>,
    /// Present in a multiplayer session.
    #[builder(default)]
    pub reconciler: Option<Arc<SessionReconciler>>,
}

/// What the local player picked in the menu.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSettings {
    pub preferences: Preferences,
    pub region: RegionSelection,
    pub mode: PlayMode,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            preferences: Preferences::default(),
            region: RegionSelection::Preset("czechia".into()),
            mode: PlayMode::Explorer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoundSnapshot {
    pub phase: RoundPhase,
    pub session: GameSession,
    /// Settings latched at the start of the current round.
    pub settings: EffectiveSettings,
}

struct ControllerState {
    session: GameSession,
    local: LocalSettings,
    server: Option<GameSettings>,
    settings: EffectiveSettings,
    epoch: u64,
    starting: bool,
    viewer: Option<Arc<dyn ViewerHandle>>,
    camera_lock: Option<CameraLock>,
    timer: Option<JoinHandle<()>>,
    events: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn release_round_resources(&mut self) {
        self.stop_timer();
        if let Some(events) = self.events.take() {
            events.abort();
        }
        if let Some(viewer) = self.viewer.take() {
            viewer.destroy();
        }
        self.camera_lock = None;
    }
}

struct Inner {
    deps: GameDeps,
    config: Config,
    sampler: LocationSampler,
    phase_tx: watch::Sender<RoundPhase>,
    state: Mutex<ControllerState>,
}

enum Acquired {
    Target(TargetLocation),
    Failed(SearchTrace),
    Stale,
}

/// Cheap to clone; all clones drive the same game.
#[derive(Clone)]
pub struct RoundController {
    inner: Arc<Inner>,
}

/// Clears the round-start flag on every exit from `start_new_round`, unless
/// a newer epoch has taken over in the meantime.
struct StartGuard<'a> {
    controller: &'a RoundController,
    epoch: u64,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.controller.lock();
        if st.epoch == self.epoch {
            st.starting = false;
        }
    }
}

impl RoundController {
    pub fn new(config: Config, deps: GameDeps, local: LocalSettings) -> Self {
        let sampler = LocationSampler::new(&config, deps.keys.clone());
        Self::with_sampler(config, deps, local, sampler)
    }

    pub fn with_sampler(config: Config, deps: GameDeps, local: LocalSettings, sampler: LocationSampler) -> Self {
        let multiplayer = deps.reconciler.is_some();
        let settings = effective(&local, None, multiplayer);
        let (phase_tx, _) = watch::channel(RoundPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                deps,
                config,
                sampler,
                phase_tx,
                state: Mutex::new(ControllerState {
                    session: GameSession::new(),
                    local,
                    server: None,
                    settings,
                    epoch: 0,
                    starting: false,
                    viewer: None,
                    camera_lock: None,
                    timer: None,
                    events: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_multiplayer(&self) -> bool {
        self.inner.deps.reconciler.is_some()
    }

    // --- Observation ---

    pub fn phase(&self) -> RoundPhase {
        self.inner.phase_tx.borrow().clone()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RoundPhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let st = self.lock();
        RoundSnapshot {
            phase: self.phase(),
            session: st.session.clone(),
            settings: st.settings.clone(),
        }
    }

    pub fn summary(&self) -> FinalSummary {
        self.lock().session.summary()
    }

    pub fn reconciler(&self) -> Option<&Arc<SessionReconciler>> {
        self.inner.deps.reconciler.as_ref()
    }

    /// Caller must hold the state lock, so phase and session move together.
    fn set_phase(&self, phase: RoundPhase) {
        let from = self.inner.phase_tx.borrow().name();
        debug!(from, to = phase.name(), "Phase transition");
        self.inner.phase_tx.send_replace(phase);
    }

    /// Set `phase` if `epoch` is still current.
    fn transition(&self, epoch: u64, phase: RoundPhase) -> bool {
        let st = self.lock();
        if st.epoch != epoch {
            debug!(epoch, current = st.epoch, phase = phase.name(), "Discarding stale transition");
            return false;
        }
        self.set_phase(phase);
        true
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    // --- Settings ---

    pub fn set_preferences(&self, preferences: Preferences) {
        self.lock().local.preferences = preferences;
    }

    pub fn select_region(&self, region: RegionSelection) {
        self.lock().local.region = region;
    }

    pub fn set_mode(&self, mode: PlayMode) {
        self.lock().local.mode = mode;
    }

    /// Authoritative settings from the relay. Read at the next round start.
    pub fn apply_server_settings(&self, settings: GameSettings) {
        info!(region = settings.region.as_str(), mode = %settings.mode, "Server settings updated");
        self.lock().server = Some(settings);
    }

    // --- Round start ---

    /// Start (or restart) the current round. A second call while one is in
    /// flight is a no-op.
    pub async fn start_new_round(&self) -> Result<(), GameError> {
        let (epoch, settings) = {
            let mut st = self.lock();
            if st.starting {
                debug!("Round start already in flight");
                return Ok(());
            }
            if matches!(*self.inner.phase_tx.borrow(), RoundPhase::Final(_)) {
                return Err(GameError::RoundNotActive("game is finished".into()));
            }
            st.starting = true;
            st.epoch += 1;
            st.release_round_resources();
            let settings = effective(&st.local, st.server.as_ref(), self.is_multiplayer());
            st.session.begin_round(&settings);
            st.settings = settings.clone();
            self.set_phase(RoundPhase::SearchingLocation);
            info!(
                round = st.session.round_index,
                mode = %settings.mode,
                multiplayer = settings.multiplayer,
                "Starting round"
            );
            (st.epoch, settings)
        };
        let _guard = StartGuard {
            controller: self,
            epoch,
        };
        self.inner.deps.map.clear_guess_marker();

        let region = match self.inner.deps.catalog.resolve(&settings.region).await {
            Ok(region) => region,
            Err(e) => {
                warn!(error = %e, "Failed to resolve region");
                self.transition(epoch, RoundPhase::Idle);
                return Err(e);
            }
        };
        if !self.is_current(epoch) {
            debug!(epoch, "Discarding stale region resolution");
            return Ok(());
        }
        self.inner.deps.map.fit_bounds(region.bounds());

        let mut load_failures = 0u32;
        loop {
            if !self.transition(epoch, RoundPhase::SearchingLocation) {
                return Ok(());
            }

            let target = match self.acquire_target(&region).await {
                Acquired::Target(target) => target,
                Acquired::Failed(trace) => {
                    let attempts = trace.attempts.len() as u32;
                    if self.transition(epoch, RoundPhase::SearchFailed(Arc::new(trace))) {
                        return Err(GameError::SearchExhausted { attempts });
                    }
                    return Ok(());
                }
                Acquired::Stale => return Ok(()),
            };

            {
                let mut st = self.lock();
                if st.epoch != epoch {
                    debug!(epoch, "Discarding stale location");
                    return Ok(());
                }
                st.session.set_target(target.clone());
                self.set_phase(RoundPhase::LoadingPanorama);
            }

            let request = LoadRequest {
                lat: target.lat,
                lon: target.lon,
                radius_m: self.inner.sampler.radius_m(),
                show_navigation: settings.mode == PlayMode::Explorer,
                api_key: self.inner.deps.keys.next_key().unwrap_or_default().to_string(),
            };
            let error = match self.inner.deps.viewer.load(request).await {
                Ok(handle) => {
                    self.install_viewer(epoch, handle, &settings);
                    return Ok(());
                }
                Err(e) => e,
            };

            if !self.is_current(epoch) {
                debug!(epoch, "Discarding stale load failure");
                return Ok(());
            }

            if let Some(reconciler) = &self.inner.deps.reconciler {
                // Clients retry in lockstep on whatever the relay sends next.
                self.transition(epoch, RoundPhase::LoadFailed(error.to_string()));
                reconciler.report_failed(target.lat, target.lon).await?;
                return Ok(());
            }

            load_failures += 1;
            if load_failures > self.inner.config.panorama_load_max_retries {
                warn!(attempts = load_failures, error = %error, "Giving up on panorama load");
                let message = error.to_string();
                self.transition(epoch, RoundPhase::LoadFailed(message.clone()));
                return Err(GameError::PanoramaLoad(message));
            }
            let backoff = self.load_backoff(load_failures);
            warn!(
                attempt = load_failures,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Panorama failed to load, searching again"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn acquire_target(&self, region: &Region) -> Acquired {
        let oracle = self.inner.deps.oracle.as_ref();
        match &self.inner.deps.reconciler {
            Some(reconciler) => match reconciler.shared_location(region, &self.inner.sampler, oracle).await {
                SharedLocation::Resolved(target) => Acquired::Target(target),
                SharedLocation::Failed(trace) => Acquired::Failed(trace),
                SharedLocation::Superseded => Acquired::Stale,
            },
            None => match self.inner.sampler.find_location(region, oracle).await {
                SearchOutcome::Found { location, .. } => Acquired::Target(location),
                SearchOutcome::NotFound(trace) => Acquired::Failed(trace),
            },
        }
    }

    fn load_backoff(&self, attempt: u32) -> Duration {
        let base = self.inner.config.panorama_retry_base.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = rand::rng().random_range(0..base);
        Duration::from_millis(exp.saturating_add(jitter))
    }

    fn install_viewer(&self, epoch: u64, handle: Arc<dyn ViewerHandle>, settings: &EffectiveSettings) {
        let mut st = self.lock();
        if st.epoch != epoch {
            debug!(epoch, "Discarding stale panorama");
            handle.destroy();
            return;
        }
        if let Some(at) = handle.position() {
            st.session.refine_target(at);
        }
        st.camera_lock = settings
            .restricts_camera()
            .then(|| CameraLock::new(handle.camera(), !settings.turn_around, !settings.zoom));
        st.events = Some(self.spawn_event_pump(epoch, handle.subscribe()));
        st.viewer = Some(handle);
        if let Some(limit) = settings.time_trial {
            debug!(limit_secs = limit, "Starting round timer");
            st.timer = Some(self.spawn_round_timer(epoch));
        }
        self.set_phase(RoundPhase::AwaitingGuess);
        info!(round = st.session.round_index, "Panorama ready");
    }

    // --- Viewer events ---

    fn spawn_event_pump(&self, epoch: u64, mut events: mpsc::UnboundedReceiver<ViewerEvent>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(controller) = upgrade(&weak) else {
                    break;
                };
                if !controller.handle_viewer_event(epoch, event) {
                    break;
                }
            }
        })
    }

    /// Returns false once the event belongs to a superseded round.
    fn handle_viewer_event(&self, epoch: u64, event: ViewerEvent) -> bool {
        let mut st = self.lock();
        if st.epoch != epoch {
            return false;
        }
        match event {
            ViewerEvent::ViewChanged => {
                if let (Some(lock), Some(viewer)) = (st.camera_lock, st.viewer.as_ref()) {
                    if let Some(corrected) = lock.correct(viewer.camera()) {
                        debug!("Restoring locked camera");
                        viewer.set_camera(corrected);
                    }
                }
            }
            ViewerEvent::PlaceChanged { lat, lon } => {
                st.session.record_live_position(LatLon::new(lat, lon));
            }
        }
        true
    }

    // --- Timer ---

    fn spawn_round_timer(&self, epoch: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        spawn_ticker(Duration::from_secs(1), move || match upgrade(&weak) {
            Some(controller) => controller.tick(epoch),
            None => false,
        })
    }

    /// One second of time-trial countdown. Returns whether to keep ticking.
    fn tick(&self, epoch: u64) -> bool {
        let mut st = self.lock();
        if st.epoch != epoch || st.session.round_submitted {
            return false;
        }
        if !st.session.tick() {
            return st.session.time_trial.remaining_secs > 0;
        }
        // This task is the timer; drop the handle rather than aborting ourselves.
        st.timer = None;
        if let Some(record) = st.session.time_out() {
            self.set_phase(RoundPhase::Result(record));
        }
        false
    }

    // --- Guess and submit ---

    pub fn place_guess(&self, lat: f64, lon: f64) -> Result<(), GameError> {
        let mut st = self.lock();
        if !matches!(*self.inner.phase_tx.borrow(), RoundPhase::AwaitingGuess) {
            return Err(GameError::RoundNotActive("not accepting guesses".into()));
        }
        if !st.session.place_guess(lat, lon) {
            return Err(GameError::RoundNotActive("round already submitted".into()));
        }
        self.inner.deps.map.draw_guess_marker(LatLon::new(lat, lon));
        Ok(())
    }

    /// Score the current guess. Duplicate calls, or a call without a guess,
    /// return `Ok(None)` and change nothing.
    pub async fn submit_guess(&self) -> Result<Option<RoundRecord>, GameError> {
        let record = {
            let mut st = self.lock();
            if !matches!(*self.inner.phase_tx.borrow(), RoundPhase::AwaitingGuess) {
                return Ok(None);
            }
            let Some(record) = st.session.submit() else {
                return Ok(None);
            };
            st.stop_timer();
            if self.is_multiplayer() {
                self.set_phase(RoundPhase::Submitted(record.clone()));
            } else {
                self.set_phase(RoundPhase::Result(record.clone()));
            }
            record
        };
        if let Some(reconciler) = &self.inner.deps.reconciler {
            reconciler.submit(&record).await?;
        }
        Ok(Some(record))
    }

    // --- Advance ---

    /// Single-player advance: next round, or the final summary once the
    /// round cap is reached.
    pub async fn next_round(&self) -> Result<(), GameError> {
        if self.is_multiplayer() {
            return Err(GameError::ServerAuthoritative);
        }
        {
            let mut st = self.lock();
            if !matches!(*self.inner.phase_tx.borrow(), RoundPhase::Result(_)) {
                return Err(GameError::RoundNotActive("no completed round to advance from".into()));
            }
            if !st.settings.infinite_mode && st.session.round_index >= self.inner.config.total_rounds {
                self.enter_final(&mut st);
                return Ok(());
            }
            st.session.round_index += 1;
            // Leave Result before unlocking so a concurrent advance is rejected.
            self.set_phase(RoundPhase::SearchingLocation);
        }
        self.start_new_round().await
    }

    /// Ask the relay to advance (multiplayer), or advance locally.
    pub async fn request_next_round(&self) -> Result<(), GameError> {
        match &self.inner.deps.reconciler {
            Some(reconciler) => {
                if !matches!(self.phase(), RoundPhase::Result(_)) {
                    return Err(GameError::RoundNotActive("round has not ended".into()));
                }
                reconciler.request_next_round().await
            }
            None => self.next_round().await,
        }
    }

    /// Explicit finish, e.g. ending an infinite game.
    pub fn finish(&self) -> Result<FinalSummary, GameError> {
        if self.is_multiplayer() {
            return Err(GameError::ServerAuthoritative);
        }
        let mut st = self.lock();
        if matches!(*self.inner.phase_tx.borrow(), RoundPhase::Idle | RoundPhase::Final(_)) {
            return Err(GameError::RoundNotActive("no game in progress".into()));
        }
        Ok(self.enter_final(&mut st))
    }

    fn enter_final(&self, st: &mut ControllerState) -> FinalSummary {
        st.epoch += 1;
        st.starting = false;
        st.release_round_resources();
        let summary = st.session.summary();
        info!(
            total_score = summary.total_score,
            rounds = summary.rounds.len(),
            "Game finished"
        );
        self.set_phase(RoundPhase::Final(summary.clone()));
        summary
    }

    /// Manual retry after a failed search or load.
    pub async fn retry(&self) -> Result<(), GameError> {
        let allowed = match self.phase() {
            RoundPhase::SearchFailed(_) => true,
            // In multiplayer the relay issues the retry.
            RoundPhase::LoadFailed(_) => !self.is_multiplayer(),
            _ => false,
        };
        if !allowed {
            return Err(GameError::RoundNotActive("nothing to retry".into()));
        }
        self.start_new_round().await
    }

    /// Back to the menu. Outstanding async work resolves into a no-op.
    pub fn teardown(&self) {
        let mut st = self.lock();
        st.epoch += 1;
        st.starting = false;
        st.release_round_resources();
        st.session = GameSession::new();
        self.set_phase(RoundPhase::Idle);
        self.inner.deps.map.clear_guess_marker();
        info!("Game torn down");
    }

    /// Start over with a fresh session.
    pub async fn play_again(&self) -> Result<(), GameError> {
        self.teardown();
        self.start_new_round().await
    }

    // --- Server directives ---

    pub async fn handle_server_message(&self, message: ServerMessage) -> Result<(), GameError> {
        let Some(reconciler) = self.inner.deps.reconciler.clone() else {
            return Err(GameError::Protocol(format!(
                "{} received outside a multiplayer session",
                message.kind()
            )));
        };
        debug!(kind = message.kind(), "Server message");

        match message {
            ServerMessage::LocationData { lat, lon, date } => {
                reconciler.apply_location(lat, lon, &date);
            }
            ServerMessage::StartNextRound { round } => {
                reconciler.begin_round(round);
                self.restart_round(Some(round));
            }
            ServerMessage::RetryLocation { message } => {
                info!(message = message.as_str(), "Server asked for a new location");
                reconciler.clear_location();
                self.restart_round(None);
            }
            ServerMessage::RoundEnd { players, .. } => {
                reconciler.record_round_end(players);
                self.force_round_end().await?;
            }
            ServerMessage::GameFinished { players } => {
                reconciler.record_final(players);
                let mut st = self.lock();
                self.enter_final(&mut st);
            }
            ServerMessage::TimerStarted { duration } => {
                info!(duration, "Round closing soon");
                reconciler.start_round_timer(duration);
            }
            ServerMessage::PlayerSubmitted { nick, .. } => {
                info!(nick = nick.as_str(), "Player submitted");
                reconciler.note_submission(&nick);
            }
            ServerMessage::SettingsUpdated { settings } => {
                self.apply_server_settings(settings);
            }
            ServerMessage::Error { message } => {
                warn!(message = message.as_str(), "Server error");
            }
        }
        Ok(())
    }

    /// Supersede whatever start is in flight and start again in the background.
    fn restart_round(&self, round: Option<u32>) {
        {
            let mut st = self.lock();
            st.epoch += 1;
            st.starting = false;
            if let Some(round) = round {
                st.session.round_index = round;
            }
        }
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.start_new_round().await {
                warn!(error = %e, "Round start failed");
            }
        });
    }

    /// `roundEnd`: submit what we have (or time out) and stop taking guesses.
    async fn force_round_end(&self) -> Result<(), GameError> {
        let to_send = {
            let mut st = self.lock();
            match self.phase() {
                RoundPhase::Submitted(record) => {
                    self.set_phase(RoundPhase::Result(record));
                    None
                }
                RoundPhase::AwaitingGuess => {
                    st.stop_timer();
                    let record = if st.session.current_guess.is_some() {
                        st.session.submit()
                    } else {
                        st.session.time_out()
                    };
                    if let Some(record) = &record {
                        self.set_phase(RoundPhase::Result(record.clone()));
                    }
                    record
                }
                RoundPhase::SearchingLocation
                | RoundPhase::LoadingPanorama
                | RoundPhase::SearchFailed(_)
                | RoundPhase::LoadFailed(_) => {
                    self.close_unplayed_round(&mut st);
                    None
                }
                other => {
                    debug!(phase = other.name(), "Round end ignored");
                    None
                }
            }
        };
        if let (Some(record), Some(reconciler)) = (to_send, &self.inner.deps.reconciler) {
            reconciler.submit(&record).await?;
        }
        Ok(())
    }

    /// The relay ended a round this client never got to play. Whatever is
    /// still in flight for it becomes stale, and the round is recorded as
    /// timed out when its location is known.
    fn close_unplayed_round(&self, st: &mut ControllerState) {
        st.epoch += 1;
        st.starting = false;
        st.release_round_resources();
        if st.session.current_target.is_none() {
            if let Some(shared) = self.reconciler().and_then(|r| r.current_location()) {
                st.session.set_target(shared);
            }
        }
        match st.session.time_out() {
            Some(record) => {
                info!(round = record.round_index, "Round ended before the panorama was ready");
                self.set_phase(RoundPhase::Result(record));
            }
            None => {
                warn!(round = st.session.round_index, "Round ended before a location was known");
                self.set_phase(RoundPhase::Idle);
            }
        }
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<RoundController> {
    weak.upgrade().map(|inner| RoundController { inner })
}

/// Settings in force for a round. A multiplayer session never runs local
/// round timing, even before the relay's settings have arrived.
fn effective(local: &LocalSettings, server: Option<&GameSettings>, multiplayer: bool) -> EffectiveSettings {
    let mut settings = EffectiveSettings::resolve(&local.preferences, local.region.clone(), local.mode, server);
    if multiplayer {
        settings.multiplayer = true;
        settings.time_trial = None;
        settings.infinite_mode = false;
    }
    settings
}
