use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::api_keys::ApiKeyRing;
use crate::error::GameError;

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY";

/// Game configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Map provider
    pub api_keys: Vec<String>,

    // Game rules
    pub total_rounds: u32,
    pub panorama_search_radius_m: u32,
    pub max_attempts_per_location: u32,
    pub polygon_attempt_multiplier: u32,

    // Recovery
    pub panorama_load_max_retries: u32,
    pub panorama_retry_base: Duration,

    // Multiplayer
    pub shared_location_timeout: Duration,
    pub round_end_countdown_secs: u32,

    // Assets and persistence
    pub data_dir: PathBuf,
    pub region_boundaries_path: PathBuf,
}

impl Config {
    /// Defaults for everything except the API keys.
    pub fn with_api_keys(api_keys: Vec<String>) -> Self {
        Self {
            api_keys,
            total_rounds: 5,
            panorama_search_radius_m: 100,
            max_attempts_per_location: 10,
            polygon_attempt_multiplier: 20,
            panorama_load_max_retries: 5,
            panorama_retry_base: Duration::from_millis(250),
            shared_location_timeout: Duration::from_secs(30),
            round_end_countdown_secs: 5,
            data_dir: PathBuf::from("./data"),
            region_boundaries_path: PathBuf::from("regions-boundaries.json"),
        }
    }

    /// Load configuration from environment variables.
    /// `MAPY_API_KEYS` is required (comma-separated); everything else has a default.
    pub fn from_env() -> Result<Self, GameError> {
        let raw_keys = env::var("MAPY_API_KEYS")
            .or_else(|_| env::var("MAPY_API_KEY"))
            .map_err(|_| GameError::Config("MAPY_API_KEYS environment variable is required".into()))?;
        let api_keys: Vec<String> = raw_keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        let defaults = Self::with_api_keys(api_keys);
        let config = Self {
            total_rounds: parse_env("TOTAL_ROUNDS", defaults.total_rounds)?,
            panorama_search_radius_m: parse_env(
                "PANORAMA_SEARCH_RADIUS_M",
                defaults.panorama_search_radius_m,
            )?,
            max_attempts_per_location: parse_env(
                "MAX_ATTEMPTS_PER_LOCATION",
                defaults.max_attempts_per_location,
            )?,
            polygon_attempt_multiplier: parse_env(
                "POLYGON_ATTEMPT_MULTIPLIER",
                defaults.polygon_attempt_multiplier,
            )?,
            panorama_load_max_retries: parse_env(
                "PANORAMA_LOAD_MAX_RETRIES",
                defaults.panorama_load_max_retries,
            )?,
            panorama_retry_base: Duration::from_millis(parse_env("PANORAMA_RETRY_BASE_MS", 250u64)?),
            shared_location_timeout: Duration::from_secs(parse_env(
                "SHARED_LOCATION_TIMEOUT_SECS",
                30u64,
            )?),
            round_end_countdown_secs: parse_env(
                "ROUND_END_COUNTDOWN_SECS",
                defaults.round_end_countdown_secs,
            )?,
            data_dir: env::var("PANOGUESS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir.clone()),
            region_boundaries_path: env::var("REGION_BOUNDARIES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.region_boundaries_path.clone()),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.api_keys.is_empty() {
            return Err(GameError::Config("at least one map API key is required".into()));
        }
        if self.api_keys.iter().any(|k| k == PLACEHOLDER_KEY) {
            return Err(GameError::Config(format!(
                "replace the {PLACEHOLDER_KEY} placeholder with a real map API key"
            )));
        }
        if self.total_rounds == 0 {
            return Err(GameError::Config("TOTAL_ROUNDS must be at least 1".into()));
        }
        if self.max_attempts_per_location == 0 {
            return Err(GameError::Config("MAX_ATTEMPTS_PER_LOCATION must be at least 1".into()));
        }
        Ok(())
    }

    pub fn key_ring(&self) -> ApiKeyRing {
        ApiKeyRing::new(self.api_keys.clone())
    }

    /// Log the loaded configuration with API keys masked.
    pub fn log_redacted(&self) {
        let masked: Vec<String> = self.api_keys.iter().map(|k| redact(k)).collect();
        info!(
            api_keys = ?masked,
            total_rounds = self.total_rounds,
            search_radius_m = self.panorama_search_radius_m,
            max_attempts = self.max_attempts_per_location,
            polygon_multiplier = self.polygon_attempt_multiplier,
            load_retries = self.panorama_load_max_retries,
            data_dir = %self.data_dir.display(),
            "Config loaded"
        );
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, GameError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| GameError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn redact(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
