//! In-process stand-ins for the map provider: a deterministic coverage grid
//! that answers both existence checks and viewer loads, and a headless
//! viewer handle. Used by the `panoguess-sim` binary and by the test mocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::debug;

use panoguess_common::{Bounds, LatLon};

use crate::traits::{
    Camera, LoadRequest, MapWidget, PanoramaOracle, PanoramaProbe, PanoramaViewer, ProbeRequest,
    ViewerEvent, ViewerHandle,
};

pub const DEFAULT_CAMERA: Camera = Camera {
    yaw: 0.0,
    pitch: 0.0,
    fov: 1.2,
};

// ---------------------------------------------------------------------------
// HeadlessViewer
// ---------------------------------------------------------------------------

/// A viewer handle with no rendering. `look` and `walk_to` play the part of
/// the player dragging the camera or clicking a navigation arrow.
pub struct HeadlessViewer {
    camera: Mutex<Camera>,
    position: Option<LatLon>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ViewerEvent>>>,
    destroyed: AtomicBool,
}

impl HeadlessViewer {
    pub fn new(position: Option<LatLon>, camera: Camera) -> Self {
        Self {
            camera: Mutex::new(camera),
            position,
            subscribers: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn look(&self, camera: Camera) {
        *self.camera.lock().unwrap_or_else(|e| e.into_inner()) = camera;
        self.emit(ViewerEvent::ViewChanged);
    }

    pub fn walk_to(&self, lat: f64, lon: f64) {
        self.emit(ViewerEvent::PlaceChanged { lat, lon });
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ViewerEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event).is_ok());
    }
}

impl ViewerHandle for HeadlessViewer {
    fn camera(&self) -> Camera {
        *self.camera.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_camera(&self, camera: Camera) {
        *self.camera.lock().unwrap_or_else(|e| e.into_inner()) = camera;
        // Programmatic moves notify like user moves do.
        self.emit(ViewerEvent::ViewChanged);
    }

    fn position(&self) -> Option<LatLon> {
        self.position
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ViewerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_destroyed() {
            self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).push(tx);
        }
        rx
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

// ---------------------------------------------------------------------------
// SimulatedCoverage
// ---------------------------------------------------------------------------

/// Deterministic imagery coverage: the world is cut into square cells and a
/// seeded draw decides per cell whether it has a panorama, located at the
/// cell center.
#[derive(Debug, Clone)]
pub struct SimulatedCoverage {
    density: f64,
    cell_deg: f64,
    seed: u64,
}

impl SimulatedCoverage {
    /// `density` is the fraction of covered cells, clamped to `[0, 1]`.
    pub fn new(density: f64, seed: u64) -> Self {
        Self {
            density: density.clamp(0.0, 1.0),
            cell_deg: 0.001,
            seed,
        }
    }

    pub fn with_cell_size(self, cell_deg: f64) -> Self {
        Self { cell_deg, ..self }
    }

    /// Panorama serving the point, if its cell is covered.
    pub fn panorama_near(&self, lat: f64, lon: f64) -> Option<LatLon> {
        let ix = (lat / self.cell_deg).floor() as i64;
        let iy = (lon / self.cell_deg).floor() as i64;
        let mix = self.seed
            ^ (ix as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (iy as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        let mut rng = StdRng::seed_from_u64(mix);
        if rng.random::<f64>() >= self.density {
            return None;
        }
        Some(LatLon::new(
            (ix as f64 + 0.5) * self.cell_deg,
            (iy as f64 + 0.5) * self.cell_deg,
        ))
    }
}

#[async_trait]
impl PanoramaOracle for SimulatedCoverage {
    async fn exists(&self, request: ProbeRequest) -> Result<PanoramaProbe> {
        if request.api_key.is_empty() {
            bail!("missing API key");
        }
        Ok(match self.panorama_near(request.lat, request.lon) {
            Some(at) => PanoramaProbe::found(at.lat, at.lon, Some("2023-06")),
            None => PanoramaProbe::missing(),
        })
    }
}

#[async_trait]
impl PanoramaViewer for SimulatedCoverage {
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn ViewerHandle>> {
        match self.panorama_near(request.lat, request.lon) {
            Some(at) => Ok(Arc::new(HeadlessViewer::new(Some(at), DEFAULT_CAMERA))),
            None => bail!("no panorama at {:.5},{:.5}", request.lat, request.lon),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingMap
// ---------------------------------------------------------------------------

/// Map widget that only logs what it would draw.
#[derive(Debug, Default)]
pub struct LoggingMap;

impl MapWidget for LoggingMap {
    fn draw_guess_marker(&self, at: LatLon) {
        debug!(lat = at.lat, lon = at.lon, "Guess marker");
    }

    fn clear_guess_marker(&self) {
        debug!("Guess marker cleared");
    }

    fn fit_bounds(&self, bounds: &Bounds) {
        debug!(
            min_lat = bounds.min_lat,
            max_lat = bounds.max_lat,
            min_lon = bounds.min_lon,
            max_lon = bounds.max_lon,
            "Map fitted"
        );
    }
}
