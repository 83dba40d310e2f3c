//! Difficulty preferences and the effective-settings resolver.
//!
//! Local preferences and multiplayer server settings are merged in one place
//! instead of both writing into the same preference object.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::region::Region;
use crate::types::{PlayMode, TargetingPolicy};

pub const DEFAULT_TIME_LIMIT_SECS: u32 = 60;

/// Player-chosen difficulty options, persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Allow switching the base map style during play.
    pub map_layers: bool,
    /// Overlay the region outline on the guess map.
    pub show_region: bool,
    /// When false, yaw and pitch stay at the initial camera.
    pub turn_around: bool,
    /// When false, field of view stays at the initial camera.
    pub zoom: bool,
    /// Score against the starting location even in explorer mode.
    pub target_original: bool,
    pub time_trial: bool,
    pub time_limit_secs: u32,
    /// No fixed round cap; the player finishes explicitly.
    pub infinite_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            map_layers: true,
            show_region: true,
            turn_around: true,
            zoom: true,
            target_original: true,
            time_trial: false,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            infinite_mode: false,
        }
    }
}

/// Lobby settings broadcast by the multiplayer server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub region: String,
    pub mode: PlayMode,
    pub map_layers: bool,
    pub show_region: bool,
    pub turn_around: bool,
    pub zoom: bool,
    pub target_original: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_region: Option<Region>,
}

/// Which region a game is played in.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionSelection {
    Preset(String),
    Custom(Region),
}

/// Settings actually in force for a round, read at round start.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub region: RegionSelection,
    pub mode: PlayMode,
    pub map_layers: bool,
    pub show_region: bool,
    pub turn_around: bool,
    pub zoom: bool,
    pub targeting: TargetingPolicy,
    pub time_trial: Option<u32>,
    pub infinite_mode: bool,
    pub multiplayer: bool,
}

impl EffectiveSettings {
    /// Merge local preferences with the authoritative server settings when
    /// in a multiplayer session. The server owns region, mode and the
    /// difficulty switches; it also owns round timing, so local time-trial
    /// and infinite mode are off in multiplayer.
    pub fn resolve(
        local: &Preferences,
        local_region: RegionSelection,
        local_mode: PlayMode,
        server: Option<&GameSettings>,
    ) -> Self {
        match server {
            Some(s) => {
                let region = match (&s.custom_region, s.region.as_str()) {
                    (Some(custom), _) => RegionSelection::Custom(custom.clone()),
                    (None, key) => RegionSelection::Preset(key.to_string()),
                };
                Self {
                    region,
                    mode: s.mode,
                    map_layers: s.map_layers,
                    show_region: s.show_region,
                    turn_around: s.turn_around,
                    zoom: s.zoom,
                    targeting: targeting_for(s.target_original),
                    time_trial: None,
                    infinite_mode: false,
                    multiplayer: true,
                }
            }
            None => Self {
                region: local_region,
                mode: local_mode,
                map_layers: local.map_layers,
                show_region: local.show_region,
                turn_around: local.turn_around,
                zoom: local.zoom,
                targeting: targeting_for(local.target_original),
                time_trial: (local.time_trial && local.time_limit_secs > 0)
                    .then_some(local.time_limit_secs),
                infinite_mode: local.infinite_mode,
                multiplayer: false,
            },
        }
    }

    /// True when the viewer camera must be clamped on every change.
    pub fn restricts_camera(&self) -> bool {
        !self.turn_around || !self.zoom
    }
}

fn targeting_for(target_original: bool) -> TargetingPolicy {
    if target_original {
        TargetingPolicy::OriginalLocation
    } else {
        TargetingPolicy::CurrentPosition
    }
}
