use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use panoguess_common::{destination_point, preset, Config, PlayMode, RegionSelection};
use panoguess_engine::sim::{LoggingMap, SimulatedCoverage};
use panoguess_engine::store::{GeoJsonFileBoundaries, JsonFileStore};
use panoguess_engine::traits::PreferenceStore;
use panoguess_engine::{GameDeps, LocalSettings, LocationSampler, RegionCatalog, RoundController, RoundPhase};

#[derive(Parser, Debug)]
#[command(name = "panoguess-sim", about = "Play a headless game against simulated panorama coverage")]
struct Args {
    /// Preset key or the name of a saved custom region
    #[arg(long, default_value = "prague")]
    region: String,

    /// Rounds to play (defaults to TOTAL_ROUNDS)
    #[arg(long)]
    rounds: Option<u32>,

    /// Fraction of ~100 m cells that have a panorama
    #[arg(long, default_value_t = 0.3)]
    density: f64,

    /// Guesses land up to this far from the target
    #[arg(long, default_value_t = 2.0)]
    noise_km: f64,

    /// Seed for coverage, sampling and guesses
    #[arg(long)]
    seed: Option<u64>,

    /// Fixed viewpoint instead of explorer mode
    #[arg(long)]
    static_mode: bool,

    /// Enable time trial with this many seconds per round
    #[arg(long)]
    time_limit: Option<u32>,

    /// Manual retries after a failed search before giving up
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Persist the preferences used for this run
    #[arg(long)]
    save_preferences: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("panoguess=info".parse()?))
        .init();

    let args = Args::parse();
    info!("Panoguess simulation starting...");

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to a simulated API key");
            Config::with_api_keys(vec!["simulated".into()])
        }
    };
    if let Some(rounds) = args.rounds {
        config.total_rounds = rounds.max(1);
    }
    config.log_redacted();

    let store = JsonFileStore::new(&config.data_dir);
    let mut preferences = store.load_preferences().await?.unwrap_or_default();
    if let Some(limit) = args.time_limit {
        preferences.time_trial = true;
        preferences.time_limit_secs = limit;
    }
    if args.save_preferences {
        store.save_preferences(&preferences).await?;
        info!(dir = %store.dir().display(), "Saved preferences");
    }

    let region = if preset(&args.region).is_some() {
        RegionSelection::Preset(args.region.clone())
    } else {
        let saved = store.list_custom_regions().await?;
        match saved.into_iter().find(|(name, _)| *name == args.region) {
            Some((_, region)) => RegionSelection::Custom(region),
            None => anyhow::bail!("unknown region {:?}", args.region),
        }
    };

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, region = args.region.as_str(), density = args.density, "Simulation parameters");

    let coverage = Arc::new(SimulatedCoverage::new(args.density, seed));
    let keys = Arc::new(config.key_ring());
    let deps = GameDeps::builder()
        .oracle(coverage.clone())
        .viewer(coverage)
        .map(Arc::new(LoggingMap))
        .catalog(Arc::new(RegionCatalog::new(Arc::new(GeoJsonFileBoundaries::new(
            &config.region_boundaries_path,
        )))))
        .keys(keys.clone())
        .build();
    let local = LocalSettings {
        preferences,
        region,
        mode: if args.static_mode {
            PlayMode::Static
        } else {
            PlayMode::Explorer
        },
    };
    let sampler = LocationSampler::new(&config, keys).with_seed(seed);
    let controller = RoundController::with_sampler(config, deps, local, sampler);

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut started = controller.start_new_round().await;
    loop {
        let mut failures = 0;
        while let Err(e) = started {
            failures += 1;
            if failures > args.retries {
                return Err(e.into());
            }
            warn!(error = %e, attempt = failures, "Round start failed, retrying");
            started = controller.retry().await;
        }

        let snapshot = controller.snapshot();
        let Some(target) = snapshot.session.current_target else {
            anyhow::bail!("round started without a target");
        };
        let guess = destination_point(
            target.point(),
            rng.random_range(0.0..360.0),
            rng.random_range(0.0..args.noise_km.max(0.001)),
        );
        controller.place_guess(guess.lat, guess.lon)?;
        if let Some(record) = controller.submit_guess().await? {
            info!(
                round = record.round_index,
                distance_km = record.distance_km.unwrap_or_default(),
                score = record.score,
                "Round complete"
            );
        }

        started = controller.next_round().await;
        if let RoundPhase::Final(summary) = controller.phase() {
            for round in &summary.rounds {
                info!(
                    round = round.round_index,
                    target_lat = round.target.lat,
                    target_lon = round.target.lon,
                    distance_km = round.distance_km.unwrap_or_default(),
                    score = round.score,
                    timed_out = round.timed_out,
                    "Breakdown"
                );
            }
            info!(total_score = summary.total_score, rounds = summary.rounds.len(), "Final score");
            break;
        }
    }

    Ok(())
}
