use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use panoguess_common::{preset, GameError, Region, RegionSelection, PRESETS};

use crate::traits::BoundarySource;

/// Resolves region selections into playable regions. Preset outlines are
/// fetched from the boundary source on first use and cached for the
/// catalog's lifetime.
pub struct RegionCatalog {
    boundaries: Arc<dyn BoundarySource>,
    loaded: Mutex<HashMap<String, Region>>,
}

impl RegionCatalog {
    pub fn new(boundaries: Arc<dyn BoundarySource>) -> Self {
        Self {
            boundaries,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn preset_keys(&self) -> Vec<&'static str> {
        PRESETS.iter().map(|p| p.key).collect()
    }

    pub async fn resolve(&self, selection: &RegionSelection) -> Result<Region, GameError> {
        match selection {
            RegionSelection::Preset(key) => self.preset_region(key).await,
            RegionSelection::Custom(region) => {
                region.validate()?;
                Ok(region.clone())
            }
        }
    }

    async fn preset_region(&self, key: &str) -> Result<Region, GameError> {
        let base = preset(key).ok_or_else(|| GameError::UnknownRegion(key.to_string()))?;

        // Held across the fetch so concurrent resolves load each key once.
        let mut loaded = self.loaded.lock().await;
        if let Some(region) = loaded.get(key) {
            return Ok(region.clone());
        }

        let mut region = base.to_region();
        match self.boundaries.load_boundary(key).await {
            Ok(Some(ring)) => {
                region.attach_polygons(vec![ring])?;
                info!(region = key, "Attached region boundary");
                loaded.insert(key.to_string(), region.clone());
            }
            Ok(None) => {
                debug!(region = key, "No boundary for region, using bounds only");
                loaded.insert(key.to_string(), region.clone());
            }
            Err(e) => {
                // Not cached, so the next round tries the asset again.
                warn!(region = key, error = %e, "Failed to load region boundary, using bounds only");
            }
        }
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBoundarySource;
    use panoguess_common::{Bounds, LatLon};

    fn ring() -> Vec<LatLon> {
        vec![
            LatLon::new(49.95, 14.25),
            LatLon::new(49.95, 14.70),
            LatLon::new(50.17, 14.45),
        ]
    }

    #[tokio::test]
    async fn boundary_is_attached_once() {
        let source = Arc::new(MockBoundarySource::new().on_boundary("prague", ring()));
        let catalog = RegionCatalog::new(source.clone());
        let first = catalog.resolve(&RegionSelection::Preset("prague".into())).await.unwrap();
        let second = catalog.resolve(&RegionSelection::Preset("prague".into())).await.unwrap();
        assert!(first.has_shape_filter());
        assert_eq!(first, second);
        assert_eq!(source.requests(), vec!["prague".to_string()]);
    }

    #[tokio::test]
    async fn missing_boundary_falls_back_to_bounds() {
        let catalog = RegionCatalog::new(Arc::new(MockBoundarySource::new()));
        let region = catalog.resolve(&RegionSelection::Preset("brno".into())).await.unwrap();
        assert!(!region.has_shape_filter());
        assert_eq!(region.bounds, preset("brno").unwrap().bounds);
    }

    #[tokio::test]
    async fn failing_source_is_retried_next_time() {
        let source = Arc::new(MockBoundarySource::new().failing());
        let catalog = RegionCatalog::new(source.clone());
        let region = catalog.resolve(&RegionSelection::Preset("czechia".into())).await.unwrap();
        assert!(!region.has_shape_filter());
        catalog.resolve(&RegionSelection::Preset("czechia".into())).await.unwrap();
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn unknown_preset_is_an_error() {
        let catalog = RegionCatalog::new(Arc::new(MockBoundarySource::new()));
        let err = catalog
            .resolve(&RegionSelection::Preset("atlantis".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::UnknownRegion(ref k) if k == "atlantis"));
    }

    #[tokio::test]
    async fn custom_region_passes_through() {
        let catalog = RegionCatalog::new(Arc::new(MockBoundarySource::new()));
        let custom = Region::bounds_only("Garden", Bounds::new(50.0, 50.1, 14.0, 14.1).unwrap());
        let region = catalog.resolve(&RegionSelection::Custom(custom.clone())).await.unwrap();
        assert_eq!(region, custom);
    }
}
