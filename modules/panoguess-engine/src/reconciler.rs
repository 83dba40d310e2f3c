//! Multiplayer adapter over the round lifecycle.
//!
//! The relay is authoritative: it picks the round's location (the first offer
//! it receives), ends rounds, advances them and owns the scoreboard. This
//! client searches independently, offers what it finds, and adopts whatever
//! the relay broadcasts first. One `watch` channel per round carries that
//! broadcast to every waiter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use panoguess_common::protocol::{shared_target, standings, ClientMessage, PlayerResult, Standing};
use panoguess_common::{Config, GameError, Region, RoundRecord, TargetLocation};

use crate::sampler::{LocationSampler, SearchOutcome, SearchTrace};
use crate::timer::Countdown;
use crate::traits::{PanoramaOracle, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum SharedLocation {
    /// The relay's location for this round.
    Resolved(TargetLocation),
    /// Local search failed and no broadcast arrived in time.
    Failed(SearchTrace),
    /// The round was reset (new round or retry) while waiting.
    Superseded,
}

struct ReconcilerState {
    round: u32,
    location_tx: watch::Sender<Option<TargetLocation>>,
    submitted: Vec<String>,
    round_results: Vec<PlayerResult>,
    final_results: Option<Vec<PlayerResult>>,
    countdown: Option<Countdown>,
}

pub struct SessionReconciler {
    transport: Arc<dyn Transport>,
    shared_timeout: Duration,
    round_end_countdown_secs: u32,
    state: Mutex<ReconcilerState>,
}

impl SessionReconciler {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            shared_timeout: config.shared_location_timeout,
            round_end_countdown_secs: config.round_end_countdown_secs,
            state: Mutex::new(ReconcilerState {
                round: 1,
                location_tx: watch::channel(None).0,
                submitted: Vec::new(),
                round_results: Vec::new(),
                final_results: None,
                countdown: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReconcilerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn round(&self) -> u32 {
        self.lock().round
    }

    /// The location already broadcast for this round, if any.
    pub fn current_location(&self) -> Option<TargetLocation> {
        self.lock().location_tx.borrow().clone()
    }

    /// Race the local search against the relay broadcast. Whatever the relay
    /// broadcasts first is the answer for every client, including this one.
    pub async fn shared_location(
        &self,
        region: &Region,
        sampler: &LocationSampler,
        oracle: &dyn PanoramaOracle,
    ) -> SharedLocation {
        let (mut rx, round) = {
            let st = self.lock();
            if let Some(location) = st.location_tx.borrow().clone() {
                debug!(round = st.round, "Shared location already known");
                return SharedLocation::Resolved(location);
            }
            (st.location_tx.subscribe(), st.round)
        };

        let search = sampler.find_location(region, oracle);
        tokio::pin!(search);

        let outcome = tokio::select! {
            biased;
            shared = wait_for_location(&mut rx) => {
                debug!(round, "Broadcast arrived before local search finished");
                return shared.map_or(SharedLocation::Superseded, SharedLocation::Resolved);
            }
            outcome = &mut search => outcome,
        };

        let trace = match outcome {
            SearchOutcome::Found { location, trace } => {
                if self.round() == round && self.current_location().is_none() {
                    match self.transport.send(ClientMessage::offer(&location)).await {
                        Ok(()) => info!(round, lat = location.lat, lon = location.lon, "Published location"),
                        Err(e) => warn!(round, error = %e, "Failed to publish location"),
                    }
                }
                trace
            }
            SearchOutcome::NotFound(trace) => {
                warn!(round, "Local search failed, waiting for another player's location");
                trace
            }
        };

        match tokio::time::timeout(self.shared_timeout, wait_for_location(&mut rx)).await {
            Ok(Some(location)) => SharedLocation::Resolved(location),
            Ok(None) => SharedLocation::Superseded,
            Err(_) => {
                warn!(round, timeout_secs = self.shared_timeout.as_secs(), "No shared location arrived");
                SharedLocation::Failed(trace)
            }
        }
    }

    /// `locationData` from the relay. The first one of a round wins.
    pub fn apply_location(&self, lat: f64, lon: f64, date: &str) -> bool {
        let st = self.lock();
        let target = shared_target(lat, lon, date);
        let applied = st.location_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(target.clone());
            true
        });
        if applied {
            info!(round = st.round, lat, lon, "Received shared location");
        } else {
            debug!(round = st.round, lat, lon, "Ignoring second location broadcast");
        }
        applied
    }

    /// `startNextRound`: forget the previous round's location and results.
    /// Waiters on the old round observe `Superseded`.
    pub fn begin_round(&self, round: u32) {
        let mut st = self.lock();
        st.round = round;
        st.location_tx = watch::channel(None).0;
        st.submitted.clear();
        st.round_results.clear();
        st.countdown = None;
        info!(round, "Server started round");
    }

    /// `retryLocation`: same round, fresh location.
    pub fn clear_location(&self) {
        let mut st = self.lock();
        st.location_tx = watch::channel(None).0;
        info!(round = st.round, "Server requested a new location");
    }

    pub async fn report_failed(&self, lat: f64, lon: f64) -> Result<(), GameError> {
        warn!(lat, lon, "Reporting failed location to server");
        self.send(ClientMessage::LocationFailed { lat, lon }).await
    }

    /// Send this client's own result. A round without a guess sends nothing.
    pub async fn submit(&self, record: &RoundRecord) -> Result<(), GameError> {
        let Some(guess) = record.guess else {
            debug!(round = record.round_index, "No guess to send");
            return Ok(());
        };
        self.send(ClientMessage::SubmitGuess {
            lat: guess.lat,
            lon: guess.lon,
            score: record.score,
        })
        .await
    }

    /// Ask the relay to advance. The advance arrives as `startNextRound`.
    pub async fn request_next_round(&self) -> Result<(), GameError> {
        self.send(ClientMessage::NextRound).await
    }

    pub fn note_submission(&self, nick: &str) {
        let mut st = self.lock();
        if !st.submitted.iter().any(|n| n == nick) {
            st.submitted.push(nick.to_string());
        }
    }

    pub fn submitted_players(&self) -> Vec<String> {
        self.lock().submitted.clone()
    }

    /// `roundEnd`: keep the authoritative results and start the pause
    /// countdown shown before the next round.
    pub fn record_round_end(&self, players: Vec<PlayerResult>) {
        let mut st = self.lock();
        info!(round = st.round, players = players.len(), "Round ended");
        st.round_results = players;
        st.countdown = Some(Countdown::start(self.round_end_countdown_secs));
    }

    /// `timerStarted`: someone submitted and the round closes in `secs`.
    pub fn start_round_timer(&self, secs: u32) {
        self.lock().countdown = Some(Countdown::start(secs));
    }

    pub fn countdown(&self) -> Option<watch::Receiver<u32>> {
        self.lock().countdown.as_ref().map(Countdown::subscribe)
    }

    pub fn round_results(&self) -> Vec<PlayerResult> {
        self.lock().round_results.clone()
    }

    pub fn record_final(&self, players: Vec<PlayerResult>) {
        let mut st = self.lock();
        info!(players = players.len(), "Game finished");
        st.final_results = Some(players);
        st.countdown = None;
    }

    pub fn final_standings(&self) -> Option<Vec<Standing>> {
        self.lock().final_results.as_deref().map(standings)
    }

    async fn send(&self, message: ClientMessage) -> Result<(), GameError> {
        self.transport
            .send(message)
            .await
            .map_err(|e| GameError::Transport(e.to_string()))
    }
}

/// Resolve once a location is present. `None` if the round's channel was
/// replaced while waiting.
async fn wait_for_location(rx: &mut watch::Receiver<Option<TargetLocation>>) -> Option<TargetLocation> {
    rx.wait_for(Option::is_some).await.ok().and_then(|v| v.clone())
}
