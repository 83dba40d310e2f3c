//! Client side of the multiplayer relay protocol.
//!
//! Every frame is `{ "type": <camelCase name>, "payload": { ... } }`.

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::preferences::GameSettings;
use crate::types::TargetLocation;

/// Messages this client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Offer a location found by the local search. The relay keeps the first
    /// offer of a round and broadcasts it as `locationData`.
    RequestLocation {
        lat: f64,
        lon: f64,
        #[serde(default)]
        date: String,
    },
    /// This client's guess and its self-computed score.
    SubmitGuess { lat: f64, lon: f64, score: u32 },
    /// Ask the relay to advance; the advance itself arrives as `startNextRound`.
    NextRound,
    /// The shared location could not be loaded here.
    LocationFailed { lat: f64, lon: f64 },
}

/// Messages the relay sends to this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    LocationData {
        lat: f64,
        lon: f64,
        #[serde(default)]
        date: String,
    },
    #[serde(rename_all = "camelCase")]
    StartNextRound { round: u32 },
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        #[serde(default)]
        round: u32,
        #[serde(default)]
        players: Vec<PlayerResult>,
    },
    GameFinished {
        #[serde(default)]
        players: Vec<PlayerResult>,
    },
    RetryLocation {
        #[serde(default)]
        message: String,
    },
    /// Someone submitted; the round closes after `duration` seconds.
    TimerStarted { duration: u32 },
    #[serde(rename_all = "camelCase")]
    PlayerSubmitted {
        player_id: String,
        nick: String,
        #[serde(default)]
        icon: String,
    },
    SettingsUpdated { settings: GameSettings },
    Error { message: String },
}

impl ServerMessage {
    pub fn parse(frame: &str) -> Result<Self, GameError> {
        serde_json::from_str(frame).map_err(|e| GameError::Protocol(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::LocationData { .. } => "locationData",
            ServerMessage::StartNextRound { .. } => "startNextRound",
            ServerMessage::RoundEnd { .. } => "roundEnd",
            ServerMessage::GameFinished { .. } => "gameFinished",
            ServerMessage::RetryLocation { .. } => "retryLocation",
            ServerMessage::TimerStarted { .. } => "timerStarted",
            ServerMessage::PlayerSubmitted { .. } => "playerSubmitted",
            ServerMessage::SettingsUpdated { .. } => "settingsUpdated",
            ServerMessage::Error { .. } => "error",
        }
    }
}

impl ClientMessage {
    pub fn to_frame(&self) -> Result<String, GameError> {
        serde_json::to_string(self).map_err(|e| GameError::Protocol(e.to_string()))
    }

    pub fn offer(location: &TargetLocation) -> Self {
        ClientMessage::RequestLocation {
            lat: location.lat,
            lon: location.lon,
            date: location.captured_at.clone().unwrap_or_default(),
        }
    }
}

/// Location broadcast by the relay, as a round target.
pub fn shared_target(lat: f64, lon: f64, date: &str) -> TargetLocation {
    TargetLocation {
        lat,
        lon,
        captured_at: (!date.is_empty()).then(|| date.to_string()),
    }
}

/// Server-authoritative per-player result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub id: String,
    pub nick: String,
    #[serde(default)]
    pub icon: String,
    pub score: u32,
    #[serde(default)]
    pub round_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_lon: Option<f64>,
    #[serde(default)]
    pub has_guess: bool,
}

/// A scoreboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub rank: usize,
    pub player: PlayerResult,
}

/// Order players by total score, highest first; ties by nick. Ranks are
/// 1-based and positional.
pub fn standings(players: &[PlayerResult]) -> Vec<Standing> {
    let mut sorted = players.to_vec();
    sorted.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.nick.cmp(&b.nick)));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, player)| Standing { rank: i + 1, player })
        .collect()
}
