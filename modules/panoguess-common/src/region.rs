//! Playable regions: a bounding box plus an optional set of polygon rings.
//!
//! An empty ring set means "no shape filter": every point in the bounds is
//! playable. Regions are replaced wholesale on reselection; the only in-place
//! change is attaching a lazily-loaded boundary to a preset.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GameError;
use crate::geo::{destination_point, point_in_any};
use crate::types::{Bounds, LatLon, Ring};

/// Vertices used to approximate a circle region.
pub const CIRCLE_VERTICES: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub name: String,
    pub bounds: Bounds,
    /// Rings in `[lat, lon]` pair form on the wire.
    #[serde(rename = "paths", default, with = "latlon_pairs")]
    #[schemars(with = "Vec<Vec<[f64; 2]>>")]
    pub polygons: Vec<Ring>,
}

impl Region {
    /// A region with no shape filter.
    pub fn bounds_only(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            bounds,
            polygons: Vec::new(),
        }
    }

    pub fn new(name: impl Into<String>, bounds: Bounds, polygons: Vec<Ring>) -> Result<Self, GameError> {
        let region = Self {
            name: name.into(),
            bounds,
            polygons,
        };
        region.validate()?;
        Ok(region)
    }

    /// Build a region from user-drawn rings. Bounds are the envelope of every
    /// vertex; rings are stored verbatim.
    pub fn from_drawing(name: impl Into<String>, rings: Vec<Ring>) -> Result<Self, GameError> {
        if rings.is_empty() {
            return Err(GameError::InvalidRegion("drawing has no shapes".into()));
        }
        check_rings(&rings)?;
        let bounds = Bounds::envelope(rings.iter().flatten())
            .ok_or_else(|| GameError::InvalidRegion("drawing has no points".into()))?;
        Self::new(name, bounds, rings)
    }

    /// Circle of `radius_km` around `center`, stored as a polygon ring.
    pub fn circle(name: impl Into<String>, center: LatLon, radius_km: f64) -> Result<Self, GameError> {
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(GameError::InvalidRegion(format!(
                "circle radius must be positive, got {radius_km}"
            )));
        }
        let ring: Ring = (0..CIRCLE_VERTICES)
            .map(|i| {
                let bearing = 360.0 * i as f64 / CIRCLE_VERTICES as f64;
                destination_point(center, bearing, radius_km)
            })
            .collect();
        Self::from_drawing(name, vec![ring])
    }

    pub fn validate(&self) -> Result<(), GameError> {
        self.bounds.validate()?;
        check_rings(&self.polygons)
    }

    pub fn has_shape_filter(&self) -> bool {
        !self.polygons.is_empty()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// True for any point in bounds when there is no shape filter, else
    /// true if any ring contains the point.
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        if self.polygons.is_empty() {
            return self.bounds.contains(lat, lon);
        }
        point_in_any(lat, lon, &self.polygons)
    }

    /// Attach boundary rings loaded after construction. Bounds are kept.
    pub fn attach_polygons(&mut self, rings: Vec<Ring>) -> Result<(), GameError> {
        check_rings(&rings)?;
        debug!(region = self.name.as_str(), rings = rings.len(), "Attached boundary");
        self.polygons = rings;
        Ok(())
    }
}

fn check_rings(rings: &[Ring]) -> Result<(), GameError> {
    for (i, ring) in rings.iter().enumerate() {
        if ring.len() < 3 {
            return Err(GameError::InvalidRegion(format!(
                "ring {i} has {} points, need at least 3",
                ring.len()
            )));
        }
        if ring.iter().any(|p| !(p.lat.is_finite() && p.lon.is_finite())) {
            return Err(GameError::InvalidRegion(format!("ring {i} has a non-finite point")));
        }
    }
    Ok(())
}

// --- Presets ---

/// A built-in region: key, display name and bounds.
#[derive(Debug, Clone, Copy)]
pub struct RegionPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub bounds: Bounds,
}

impl RegionPreset {
    pub fn to_region(&self) -> Region {
        Region::bounds_only(self.name, self.bounds)
    }
}

const fn bbox(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Bounds {
    Bounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

pub const PRESETS: &[RegionPreset] = &[
    RegionPreset {
        key: "czechia",
        name: "Czech Republic",
        bounds: bbox(48.5, 51.1, 12.0, 18.9),
    },
    RegionPreset {
        key: "prague",
        name: "Prague",
        bounds: bbox(49.94, 50.18, 14.22, 14.71),
    },
    RegionPreset {
        key: "brno",
        name: "Brno",
        bounds: bbox(49.13, 49.27, 16.48, 16.73),
    },
    RegionPreset {
        key: "moravia",
        name: "Moravia",
        bounds: bbox(48.5, 50.3, 16.5, 18.9),
    },
    RegionPreset {
        key: "bohemia",
        name: "Bohemia",
        bounds: bbox(48.5, 51.1, 12.0, 16.5),
    },
];

pub fn preset(key: &str) -> Option<&'static RegionPreset> {
    PRESETS.iter().find(|p| p.key == key)
}

// --- Boundary asset ---

#[derive(Debug, Deserialize)]
struct GeoJsonGeometry {
    coordinates: Vec<Vec<[f64; 2]>>,
}

/// Parse a boundary asset: an object keyed by region key whose values are
/// GeoJSON polygon geometries. The outer ring (`coordinates[0]`) is read and
/// converted from `[lon, lat]` to (lat, lon). Holes are ignored.
pub fn parse_boundaries(json: &str) -> Result<HashMap<String, Ring>, GameError> {
    let raw: HashMap<String, GeoJsonGeometry> = serde_json::from_str(json)
        .map_err(|e| GameError::InvalidRegion(format!("boundary asset: {e}")))?;

    let mut out = HashMap::with_capacity(raw.len());
    for (key, geometry) in raw {
        let Some(outer) = geometry.coordinates.into_iter().next() else {
            continue;
        };
        let ring: Ring = outer.iter().map(|[lon, lat]| LatLon::new(*lat, *lon)).collect();
        if ring.len() >= 3 {
            out.insert(key, ring);
        }
    }
    Ok(out)
}

/// Serde adapter: rings as nested `[lat, lon]` arrays.
mod latlon_pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::types::{LatLon, Ring};

    pub fn serialize<S: Serializer>(rings: &[Ring], serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<Vec<[f64; 2]>> = rings
            .iter()
            .map(|ring| ring.iter().map(|p| [p.lat, p.lon]).collect())
            .collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Ring>, D::Error> {
        let pairs = Option::<Vec<Vec<[f64; 2]>>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(pairs
            .into_iter()
            .map(|ring| ring.into_iter().map(|[lat, lon]| LatLon::new(lat, lon)).collect())
            .collect())
    }
}
