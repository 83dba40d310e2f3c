// Trait abstractions for the collaborators the round lifecycle drives.
//
// PanoramaOracle: "is there imagery near this point?" (coverage index).
// PanoramaViewer / ViewerHandle: loads imagery and reports camera/place changes.
// MapWidget: the guess map; only marker drawing and bounds fitting matter here.
// BoundarySource: lazily fetched region outlines.
// PreferenceStore: opaque key/value persistence for preferences and custom regions.
// Transport: outbound half of the multiplayer relay connection.
//
// Real implementations live outside this crate; `sim` and `testing` provide
// in-process ones so the whole lifecycle runs without network access.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use panoguess_common::protocol::ClientMessage;
use panoguess_common::{Bounds, LatLon, Preferences, Region, Ring};

// ---------------------------------------------------------------------------
// Panorama coverage and viewer
// ---------------------------------------------------------------------------

/// One existence check against the coverage index.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: u32,
    pub api_key: String,
}

/// Snapped position of indexed imagery.
#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaInfo {
    pub lat: f64,
    pub lon: f64,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaProbe {
    pub exists: bool,
    pub info: Option<PanoramaInfo>,
}

impl PanoramaProbe {
    pub fn missing() -> Self {
        Self {
            exists: false,
            info: None,
        }
    }

    pub fn found(lat: f64, lon: f64, date: Option<&str>) -> Self {
        Self {
            exists: true,
            info: Some(PanoramaInfo {
                lat,
                lon,
                date: date.map(str::to_string),
            }),
        }
    }
}

#[async_trait]
pub trait PanoramaOracle: Send + Sync {
    /// Check whether imagery exists within `radius_m` of the point.
    async fn exists(&self, request: ProbeRequest) -> Result<PanoramaProbe>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub lat: f64,
    pub lon: f64,
    pub radius_m: u32,
    /// Explorer mode: allow moving to adjacent coverage points.
    pub show_navigation: bool,
    pub api_key: String,
}

/// Camera orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub yaw: f64,
    pub pitch: f64,
    pub fov: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    /// Camera moved; read the new camera from the handle.
    ViewChanged,
    /// Player navigated to another coverage point (explorer mode).
    PlaceChanged { lat: f64, lon: f64 },
}

#[async_trait]
pub trait PanoramaViewer: Send + Sync {
    /// Load imagery near the point. Errors when nothing can be shown there.
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn ViewerHandle>>;
}

/// A loaded panorama. Dropped from the controller on teardown after `destroy`.
pub trait ViewerHandle: Send + Sync {
    fn camera(&self) -> Camera;

    fn set_camera(&self, camera: Camera);

    /// Snap-corrected position the viewer actually opened at, if known.
    fn position(&self) -> Option<LatLon>;

    /// Event stream for the lifetime of this handle. Closed by `destroy`.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ViewerEvent>;

    fn destroy(&self);
}

// ---------------------------------------------------------------------------
// Guess map
// ---------------------------------------------------------------------------

pub trait MapWidget: Send + Sync {
    fn draw_guess_marker(&self, at: LatLon);

    fn clear_guess_marker(&self);

    fn fit_bounds(&self, bounds: &Bounds);
}

// ---------------------------------------------------------------------------
// Assets and persistence
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Outline for a preset region key. `None` when the asset has no entry.
    async fn load_boundary(&self, key: &str) -> Result<Option<Ring>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn save_preferences(&self, prefs: &Preferences) -> Result<()>;

    async fn load_preferences(&self) -> Result<Option<Preferences>>;

    async fn save_custom_region(&self, name: &str, region: &Region) -> Result<()>;

    /// All saved regions, ordered by name.
    async fn list_custom_regions(&self) -> Result<Vec<(String, Region)>>;

    /// Returns whether a region with that name existed.
    async fn delete_custom_region(&self, name: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Multiplayer relay
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: ClientMessage) -> Result<()>;
}
