// Test mocks for the round lifecycle.
//
// One mock per trait boundary:
// - ScriptedOracle (PanoramaOracle): scripted or fixed answers, records calls
// - MockViewer (PanoramaViewer): succeeds or fails on demand, hands out HeadlessViewers
// - RecordingMap (MapWidget): records marker and bounds calls
// - MockBoundarySource (BoundarySource): HashMap-based key→ring
// - RecordingTransport (Transport): records outbound messages
// - LoopbackRelay (Transport): emulates the relay's first-offer-wins broadcast
//
// Plus helpers for building controllers and player results.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use panoguess_common::protocol::{ClientMessage, PlayerResult};
use panoguess_common::{Bounds, Config, LatLon, Ring};

use crate::catalog::RegionCatalog;
use crate::reconciler::SessionReconciler;
use crate::sim::{HeadlessViewer, DEFAULT_CAMERA};
use crate::traits::{
    BoundarySource, LoadRequest, MapWidget, PanoramaOracle, PanoramaProbe, PanoramaViewer,
    ProbeRequest, Transport, ViewerHandle,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Prague preset bounds.
pub const PRAGUE: Bounds = Bounds {
    min_lat: 49.94,
    max_lat: 50.18,
    min_lon: 14.22,
    max_lon: 14.71,
};

/// Old Town Square, Prague.
pub const OLD_TOWN: (f64, f64) = (50.08, 14.43);

/// Config with fast retries and a short multiplayer wait.
pub fn test_config() -> Config {
    Config {
        panorama_retry_base: Duration::from_millis(1),
        shared_location_timeout: Duration::from_secs(2),
        ..Config::with_api_keys(vec!["test-key".into()])
    }
}

pub fn player(id: &str, nick: &str, score: u32) -> PlayerResult {
    PlayerResult {
        id: id.into(),
        nick: nick.into(),
        icon: String::new(),
        score,
        round_score: 0,
        guess_lat: None,
        guess_lon: None,
        has_guess: false,
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

enum OracleMode {
    /// Answers in order; "not found" once the script runs out.
    Script(Mutex<VecDeque<Result<PanoramaProbe, String>>>),
    /// Panorama exactly at every sampled point.
    AtSample,
    /// Same answer for every point.
    Fixed(PanoramaProbe),
}

pub struct ScriptedOracle {
    mode: OracleMode,
    delay: Option<Duration>,
    calls: Mutex<Vec<ProbeRequest>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Result<PanoramaProbe, String>>) -> Self {
        Self::with_mode(OracleMode::Script(Mutex::new(script.into())))
    }

    pub fn never() -> Self {
        Self::with_mode(OracleMode::Fixed(PanoramaProbe::missing()))
    }

    pub fn always_at_sample() -> Self {
        Self::with_mode(OracleMode::AtSample)
    }

    /// Every check succeeds and snaps to `(lat, lon)`.
    pub fn found_at(lat: f64, lon: f64) -> Self {
        Self::with_mode(OracleMode::Fixed(PanoramaProbe::found(lat, lon, None)))
    }

    /// Sleep before answering each check.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_mode(mode: OracleMode) -> Self {
        Self {
            mode,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProbeRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PanoramaOracle for ScriptedOracle {
    async fn exists(&self, request: ProbeRequest) -> Result<PanoramaProbe> {
        lock(&self.calls).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.mode {
            OracleMode::Script(script) => match lock(script).pop_front() {
                Some(Ok(probe)) => Ok(probe),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Ok(PanoramaProbe::missing()),
            },
            OracleMode::AtSample => Ok(PanoramaProbe::found(request.lat, request.lon, None)),
            OracleMode::Fixed(probe) => Ok(probe.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockViewer
// ---------------------------------------------------------------------------

/// Loads succeed with a `HeadlessViewer` unless told to fail.
/// Builder pattern: `.failing_first()`, `.always_failing()`, `.snap_to()`, `.with_delay()`.
pub struct MockViewer {
    failures_left: Mutex<u32>,
    snap: Option<LatLon>,
    delay: Option<Duration>,
    loads: Mutex<Vec<LoadRequest>>,
    handles: Mutex<Vec<Arc<HeadlessViewer>>>,
}

impl Default for MockViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockViewer {
    pub fn new() -> Self {
        Self {
            failures_left: Mutex::new(0),
            snap: None,
            delay: None,
            loads: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(self, n: u32) -> Self {
        *lock(&self.failures_left) = n;
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_first(u32::MAX)
    }

    /// Report this position as the snap-corrected location of every load.
    pub fn snap_to(mut self, lat: f64, lon: f64) -> Self {
        self.snap = Some(LatLon::new(lat, lon));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn loads(&self) -> Vec<LoadRequest> {
        lock(&self.loads).clone()
    }

    pub fn last_handle(&self) -> Option<Arc<HeadlessViewer>> {
        lock(&self.handles).last().cloned()
    }

    pub fn handles(&self) -> Vec<Arc<HeadlessViewer>> {
        lock(&self.handles).clone()
    }
}

#[async_trait]
impl PanoramaViewer for MockViewer {
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn ViewerHandle>> {
        lock(&self.loads).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut left = lock(&self.failures_left);
            if *left > 0 {
                *left = left.saturating_sub(1);
                bail!("MockViewer: refused {:.4},{:.4}", request.lat, request.lon);
            }
        }
        let position = self.snap.unwrap_or(LatLon::new(request.lat, request.lon));
        let handle = Arc::new(HeadlessViewer::new(Some(position), DEFAULT_CAMERA));
        lock(&self.handles).push(handle.clone());
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// RecordingMap
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingMap {
    markers: Mutex<Vec<LatLon>>,
    clears: Mutex<u32>,
    fitted: Mutex<Vec<Bounds>>,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> Vec<LatLon> {
        lock(&self.markers).clone()
    }

    pub fn clears(&self) -> u32 {
        *lock(&self.clears)
    }

    pub fn fitted(&self) -> Vec<Bounds> {
        lock(&self.fitted).clone()
    }
}

impl MapWidget for RecordingMap {
    fn draw_guess_marker(&self, at: LatLon) {
        lock(&self.markers).push(at);
    }

    fn clear_guess_marker(&self) {
        *lock(&self.clears) += 1;
    }

    fn fit_bounds(&self, bounds: &Bounds) {
        lock(&self.fitted).push(*bounds);
    }
}

// ---------------------------------------------------------------------------
// MockBoundarySource
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockBoundarySource {
    rings: HashMap<String, Ring>,
    failing: bool,
    requests: Mutex<Vec<String>>,
}

impl MockBoundarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_boundary(mut self, key: &str, ring: Ring) -> Self {
        self.rings.insert(key.to_string(), ring);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl BoundarySource for MockBoundarySource {
    async fn load_boundary(&self, key: &str) -> Result<Option<Ring>> {
        lock(&self.requests).push(key.to_string());
        if self.failing {
            bail!("MockBoundarySource: asset unavailable");
        }
        Ok(self.rings.get(key).cloned())
    }
}

/// Catalog with no boundary data: every preset is bounds-only.
pub fn bounds_only_catalog() -> Arc<RegionCatalog> {
    Arc::new(RegionCatalog::new(Arc::new(MockBoundarySource::new())))
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<ClientMessage>>,
    failing: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: ClientMessage) -> Result<()> {
        if self.failing {
            bail!("RecordingTransport: connection closed");
        }
        lock(&self.sent).push(message);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoopbackRelay
// ---------------------------------------------------------------------------

/// Minimal relay shared by several in-process clients. Keeps the first
/// `requestLocation` of a round and broadcasts it to every registered
/// reconciler as `locationData`; later offers are dropped. Everything sent
/// is recorded.
#[derive(Default)]
pub struct LoopbackRelay {
    clients: Mutex<Vec<Weak<SessionReconciler>>>,
    location: Mutex<Option<(f64, f64, String)>>,
    sent: Mutex<Vec<ClientMessage>>,
}

impl LoopbackRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, client: &Arc<SessionReconciler>) {
        lock(&self.clients).push(Arc::downgrade(client));
    }

    /// Forget the round's location, as the relay does between rounds.
    pub fn reset_round(&self) {
        *lock(&self.location) = None;
    }

    pub fn location(&self) -> Option<(f64, f64)> {
        lock(&self.location).as_ref().map(|(lat, lon, _)| (*lat, *lon))
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        lock(&self.sent).clone()
    }

    fn broadcast(&self, lat: f64, lon: f64, date: &str) {
        let clients: Vec<_> = lock(&self.clients).iter().filter_map(Weak::upgrade).collect();
        for client in clients {
            client.apply_location(lat, lon, date);
        }
    }
}

#[async_trait]
impl Transport for LoopbackRelay {
    async fn send(&self, message: ClientMessage) -> Result<()> {
        lock(&self.sent).push(message.clone());
        if let ClientMessage::RequestLocation { lat, lon, date } = message {
            let first = {
                let mut location = lock(&self.location);
                if location.is_some() {
                    false
                } else {
                    *location = Some((lat, lon, date.clone()));
                    true
                }
            };
            if first {
                self.broadcast(lat, lon, &date);
            }
        }
        Ok(())
    }
}
