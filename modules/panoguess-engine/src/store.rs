//! File-backed implementations of the persistence and boundary-asset seams.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use panoguess_common::{parse_boundaries, Preferences, Region, Ring};

use crate::traits::{BoundarySource, PreferenceStore};

const PREFERENCES_FILE: &str = "preferences.json";
const CUSTOM_REGIONS_FILE: &str = "custom_regions.json";

/// Preferences and custom regions as pretty-printed JSON files in one
/// directory. Missing files read as empty.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(value))
    }

    async fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(file);
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), "Saved");
        Ok(())
    }

    async fn custom_regions(&self) -> Result<BTreeMap<String, Region>> {
        Ok(self.read(CUSTOM_REGIONS_FILE).await?.unwrap_or_default())
    }
}

#[async_trait]
impl PreferenceStore for JsonFileStore {
    async fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        self.write(PREFERENCES_FILE, prefs).await
    }

    async fn load_preferences(&self) -> Result<Option<Preferences>> {
        self.read(PREFERENCES_FILE).await
    }

    async fn save_custom_region(&self, name: &str, region: &Region) -> Result<()> {
        region.validate()?;
        let mut regions = self.custom_regions().await?;
        regions.insert(name.to_string(), region.clone());
        self.write(CUSTOM_REGIONS_FILE, &regions).await?;
        info!(name, "Saved custom region");
        Ok(())
    }

    async fn list_custom_regions(&self) -> Result<Vec<(String, Region)>> {
        Ok(self.custom_regions().await?.into_iter().collect())
    }

    async fn delete_custom_region(&self, name: &str) -> Result<bool> {
        let mut regions = self.custom_regions().await?;
        if regions.remove(name).is_none() {
            return Ok(false);
        }
        self.write(CUSTOM_REGIONS_FILE, &regions).await?;
        info!(name, "Deleted custom region");
        Ok(true)
    }
}

/// Boundary asset on disk, read and parsed once on first request.
pub struct GeoJsonFileBoundaries {
    path: PathBuf,
    rings: OnceCell<HashMap<String, Ring>>,
}

impl GeoJsonFileBoundaries {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rings: OnceCell::new(),
        }
    }

    async fn load_all(&self) -> Result<HashMap<String, Ring>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Boundary asset not found");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        let rings = parse_boundaries(&json)?;
        info!(path = %self.path.display(), regions = rings.len(), "Loaded boundary asset");
        Ok(rings)
    }
}

#[async_trait]
impl BoundarySource for GeoJsonFileBoundaries {
    async fn load_boundary(&self, key: &str) -> Result<Option<Ring>> {
        let rings = self.rings.get_or_try_init(|| self.load_all()).await?;
        Ok(rings.get(key).cloned())
    }
}
