//! Pure game-session state. Every mutation is a synchronous method call;
//! the controller invokes them between suspension points while holding its
//! state lock, so nothing here is ever observed half-applied.

use chrono::Utc;
use tracing::info;

use panoguess_common::{
    distance_km, score_from_distance, EffectiveSettings, FinalSummary, LatLon, PlayMode,
    RoundRecord, TargetLocation, TargetingPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeTrial {
    pub enabled: bool,
    pub limit_secs: u32,
    pub remaining_secs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    /// 1-based index of the current round.
    pub round_index: u32,
    pub total_score: u32,
    pub history: Vec<RoundRecord>,
    pub current_target: Option<TargetLocation>,
    /// Last position the viewer reported after player navigation.
    pub live_position: Option<LatLon>,
    pub current_guess: Option<LatLon>,
    pub round_submitted: bool,
    pub mode: PlayMode,
    pub targeting: TargetingPolicy,
    pub time_trial: TimeTrial,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            round_index: 1,
            total_score: 0,
            history: Vec::new(),
            current_target: None,
            live_position: None,
            current_guess: None,
            round_submitted: false,
            mode: PlayMode::default(),
            targeting: TargetingPolicy::default(),
            time_trial: TimeTrial::default(),
        }
    }

    /// Reset per-round state and latch the settings in force for this round.
    pub fn begin_round(&mut self, settings: &EffectiveSettings) {
        self.current_target = None;
        self.live_position = None;
        self.current_guess = None;
        self.round_submitted = false;
        self.mode = settings.mode;
        self.targeting = settings.targeting;
        self.time_trial = match settings.time_trial {
            Some(limit) => TimeTrial {
                enabled: true,
                limit_secs: limit,
                remaining_secs: limit,
            },
            None => TimeTrial::default(),
        };
    }

    pub fn set_target(&mut self, target: TargetLocation) {
        self.current_target = Some(target);
    }

    /// Apply the viewer's snap-corrected position. Ignored once submitted.
    pub fn refine_target(&mut self, at: LatLon) {
        if self.round_submitted {
            return;
        }
        if let Some(target) = self.current_target.as_mut() {
            target.lat = at.lat;
            target.lon = at.lon;
        }
    }

    pub fn record_live_position(&mut self, at: LatLon) {
        if !self.round_submitted {
            self.live_position = Some(at);
        }
    }

    /// Last click wins. Returns false once the round is submitted.
    pub fn place_guess(&mut self, lat: f64, lon: f64) -> bool {
        if self.round_submitted {
            return false;
        }
        self.current_guess = Some(LatLon::new(lat, lon));
        true
    }

    /// The point a guess is scored against this round.
    pub fn scoring_target(&self) -> Option<TargetLocation> {
        let original = self.current_target.clone()?;
        if self.targeting == TargetingPolicy::OriginalLocation || self.mode != PlayMode::Explorer {
            return Some(original);
        }
        Some(match self.live_position {
            Some(live) => TargetLocation {
                lat: live.lat,
                lon: live.lon,
                captured_at: original.captured_at,
            },
            None => original,
        })
    }

    /// Score the current guess. `None` when there is no guess, no target, or
    /// the round was already submitted.
    pub fn submit(&mut self) -> Option<RoundRecord> {
        if self.round_submitted {
            return None;
        }
        let guess = self.current_guess?;
        let target = self.scoring_target()?;

        let distance = distance_km(guess, target.point());
        let score = score_from_distance(distance);
        let record = RoundRecord {
            round_index: self.round_index,
            distance_km: Some(distance),
            score,
            target,
            guess: Some(guess),
            timed_out: false,
            completed_at: Utc::now(),
        };
        info!(
            round = self.round_index,
            distance_km = distance,
            score,
            "Guess submitted"
        );
        Some(self.commit(record))
    }

    /// Forced submission with no guess and zero score.
    pub fn time_out(&mut self) -> Option<RoundRecord> {
        if self.round_submitted {
            return None;
        }
        let target = self.scoring_target()?;
        let record = RoundRecord {
            round_index: self.round_index,
            distance_km: None,
            score: 0,
            target,
            guess: None,
            timed_out: true,
            completed_at: Utc::now(),
        };
        info!(round = self.round_index, "Round timed out");
        Some(self.commit(record))
    }

    /// Count down one second. Returns true when the clock just hit zero on an
    /// unsubmitted round.
    pub fn tick(&mut self) -> bool {
        if !self.time_trial.enabled || self.round_submitted || self.time_trial.remaining_secs == 0 {
            return false;
        }
        self.time_trial.remaining_secs -= 1;
        self.time_trial.remaining_secs == 0
    }

    pub fn summary(&self) -> FinalSummary {
        FinalSummary::from_history(&self.history)
    }

    fn commit(&mut self, record: RoundRecord) -> RoundRecord {
        self.round_submitted = true;
        self.total_score += record.score;
        self.history.push(record.clone());
        record
    }
}
