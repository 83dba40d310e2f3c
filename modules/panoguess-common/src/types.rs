use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

// --- Geo Types ---

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One closed polygon ring, vertices in (lat, lon) order. The closing edge
/// from the last vertex back to the first is implicit.
pub type Ring = Vec<LatLon>;

/// Axis-aligned lat/lon envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, GameError> {
        let bounds = Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let finite = [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(GameError::InvalidRegion("bounds must be finite".into()));
        }
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(GameError::InvalidRegion(format!(
                "inverted bounds: lat [{}, {}], lon [{}, {}]",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    /// Min/max envelope of a point set. `None` for an empty set.
    pub fn envelope<'a>(points: impl IntoIterator<Item = &'a LatLon>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        for p in iter {
            b.min_lat = b.min_lat.min(p.lat);
            b.max_lat = b.max_lat.max(p.lat);
            b.min_lon = b.min_lon.min(p.lon);
            b.max_lon = b.max_lon.max(p.lon);
        }
        Some(b)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }
}

// --- Round Types ---

/// The ground-truth answer for a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetLocation {
    pub lat: f64,
    pub lon: f64,
    /// Capture date of the imagery as reported by the coverage index.
    #[serde(default, rename = "date", skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

impl TargetLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            captured_at: None,
        }
    }

    pub fn point(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}

/// One completed round. `guess` is `None` exactly when the round timed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round_index: u32,
    pub distance_km: Option<f64>,
    pub score: u32,
    pub target: TargetLocation,
    pub guess: Option<LatLon>,
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
}

/// Total plus per-round breakdown shown at the end of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalSummary {
    pub total_score: u32,
    pub rounds: Vec<RoundRecord>,
}

impl FinalSummary {
    pub fn from_history(history: &[RoundRecord]) -> Self {
        Self {
            total_score: history.iter().map(|r| r.score).sum(),
            rounds: history.to_vec(),
        }
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// The viewer allows moving to adjacent coverage points.
    #[default]
    Explorer,
    /// Fixed viewpoint, no navigation.
    Static,
}

impl std::fmt::Display for PlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayMode::Explorer => write!(f, "explorer"),
            PlayMode::Static => write!(f, "static"),
        }
    }
}

/// Which point a guess is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetingPolicy {
    /// The location the round started at.
    #[default]
    OriginalLocation,
    /// Wherever the player navigated the viewer to (explorer mode only).
    CurrentPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_covers_all_points() {
        let pts = [
            LatLon::new(50.0, 14.0),
            LatLon::new(49.5, 15.2),
            LatLon::new(50.3, 14.6),
        ];
        let b = Bounds::envelope(&pts).unwrap();
        assert_eq!(b.min_lat, 49.5);
        assert_eq!(b.max_lat, 50.3);
        assert_eq!(b.min_lon, 14.0);
        assert_eq!(b.max_lon, 15.2);
    }

    #[test]
    fn envelope_of_nothing_is_none() {
        assert!(Bounds::envelope(&[]).is_none());
    }

    #[test]
    fn inverted_bounds_rejected() {
        assert!(Bounds::new(51.0, 50.0, 14.0, 15.0).is_err());
        assert!(Bounds::new(50.0, 51.0, 15.0, 14.0).is_err());
        assert!(Bounds::new(50.0, 50.0, 14.0, 14.0).is_ok());
    }

    #[test]
    fn bounds_serialize_camel_case() {
        let b = Bounds::new(49.94, 50.18, 14.22, 14.71).unwrap();
        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["minLat"], 49.94);
        assert_eq!(json["maxLon"], 14.71);
    }

    #[test]
    fn summary_totals_history() {
        let record = |i: u32, score: u32| RoundRecord {
            round_index: i,
            distance_km: Some(1.0),
            score,
            target: TargetLocation::new(50.0, 14.0),
            guess: Some(LatLon::new(50.0, 14.0)),
            timed_out: false,
            completed_at: Utc::now(),
        };
        let summary = FinalSummary::from_history(&[record(1, 4000), record(2, 1200)]);
        assert_eq!(summary.total_score, 5200);
        assert_eq!(summary.rounds.len(), 2);
    }
}
