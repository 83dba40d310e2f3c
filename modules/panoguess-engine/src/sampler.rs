//! Location sampler: rejection-samples the region and asks the coverage
//! oracle until imagery is found or the attempt budget runs out.
//!
//! Oracle calls are strictly sequential, one outstanding request at a time.
//! Samples rejected by the shape filter consume budget but never reach the
//! oracle.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use panoguess_common::{ApiKeyRing, Config, Region, TargetLocation};

use crate::traits::{PanoramaOracle, ProbeRequest};

/// One sampled point, for the diagnostic map.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleAttempt {
    pub lat: f64,
    pub lon: f64,
    /// Passed the shape filter (always true for bounds-only regions).
    pub inside: bool,
    pub has_panorama: bool,
    /// Oracle transport error, if the check itself failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTrace {
    pub region: Region,
    pub budget: u32,
    pub attempts: Vec<SampleAttempt>,
}

impl SearchTrace {
    pub fn outside_count(&self) -> usize {
        self.attempts.iter().filter(|a| !a.inside).count()
    }

    pub fn oracle_calls(&self) -> usize {
        self.attempts.iter().filter(|a| a.inside).count()
    }

    pub fn error_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.error.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found {
        location: TargetLocation,
        trace: SearchTrace,
    },
    NotFound(SearchTrace),
}

impl SearchOutcome {
    pub fn trace(&self) -> &SearchTrace {
        match self {
            SearchOutcome::Found { trace, .. } => trace,
            SearchOutcome::NotFound(trace) => trace,
        }
    }

    pub fn location(&self) -> Option<&TargetLocation> {
        match self {
            SearchOutcome::Found { location, .. } => Some(location),
            SearchOutcome::NotFound(_) => None,
        }
    }
}

/// Trace entries reserved up front; larger budgets grow on demand.
const TRACE_PREALLOC: u32 = 256;

pub struct LocationSampler {
    radius_m: u32,
    max_attempts_base: u32,
    polygon_multiplier: u32,
    keys: Arc<ApiKeyRing>,
    rng: Mutex<StdRng>,
}

impl LocationSampler {
    pub fn new(config: &Config, keys: Arc<ApiKeyRing>) -> Self {
        Self {
            radius_m: config.panorama_search_radius_m,
            max_attempts_base: config.max_attempts_per_location,
            polygon_multiplier: config.polygon_attempt_multiplier,
            keys,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic sampling for tests and replays.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }

    /// Shaped regions waste samples on rejection, so their budget is inflated.
    pub fn budget_for(&self, region: &Region) -> u32 {
        if region.has_shape_filter() {
            self.max_attempts_base.saturating_mul(self.polygon_multiplier)
        } else {
            self.max_attempts_base
        }
    }

    pub async fn find_location(&self, region: &Region, oracle: &dyn PanoramaOracle) -> SearchOutcome {
        let budget = self.budget_for(region);
        let shaped = region.has_shape_filter();
        info!(
            region = region.name.as_str(),
            budget,
            shaped,
            "Searching for panorama"
        );

        let mut trace = SearchTrace {
            region: region.clone(),
            budget,
            attempts: Vec::with_capacity(budget.min(TRACE_PREALLOC) as usize),
        };

        for _ in 0..budget {
            let (lat, lon) = self.draw(region);

            if shaped && !region.contains_point(lat, lon) {
                trace.attempts.push(SampleAttempt {
                    lat,
                    lon,
                    inside: false,
                    has_panorama: false,
                    error: None,
                });
                continue;
            }

            let request = ProbeRequest {
                lat,
                lon,
                radius_m: self.radius_m,
                api_key: self.keys.next_key().unwrap_or_default().to_string(),
            };

            match oracle.exists(request).await {
                Ok(probe) if probe.exists => {
                    trace.attempts.push(SampleAttempt {
                        lat,
                        lon,
                        inside: true,
                        has_panorama: true,
                        error: None,
                    });
                    // The index snaps to its nearest imagery point; that is the answer.
                    let location = match probe.info {
                        Some(info) => TargetLocation {
                            lat: info.lat,
                            lon: info.lon,
                            captured_at: info.date,
                        },
                        None => TargetLocation::new(lat, lon),
                    };
                    info!(
                        lat = location.lat,
                        lon = location.lon,
                        attempts = trace.attempts.len(),
                        "Found panorama"
                    );
                    return SearchOutcome::Found { location, trace };
                }
                Ok(_) => {
                    debug!(lat, lon, "No panorama near sample");
                    trace.attempts.push(SampleAttempt {
                        lat,
                        lon,
                        inside: true,
                        has_panorama: false,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(lat, lon, error = %e, "Panorama check failed");
                    trace.attempts.push(SampleAttempt {
                        lat,
                        lon,
                        inside: true,
                        has_panorama: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        warn!(
            region = region.name.as_str(),
            attempts = trace.attempts.len(),
            outside = trace.outside_count(),
            checked = trace.oracle_calls(),
            errors = trace.error_count(),
            "Failed to find panorama"
        );
        SearchOutcome::NotFound(trace)
    }

    fn draw(&self, region: &Region) -> (f64, f64) {
        let b = region.bounds();
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let lat = b.min_lat + rng.random::<f64>() * (b.max_lat - b.min_lat);
        let lon = b.min_lon + rng.random::<f64>() * (b.max_lon - b.min_lon);
        (lat, lon)
    }
}
