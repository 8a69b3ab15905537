//! Headless host for the depth hypoxia hazard.
//!
//! Runs a simulated server in memory: miners wander between the surface
//! and bedrock while the hazard ticks on a fixed period and the chance
//! sampler runs on its own Tokio-driven timer. At the end, every
//! connected player's `hypoxia_chance` placeholder is logged.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `HYPOXIA_CONFIG` or `hypoxia-config.yaml`
//! 3. Build the in-memory host and connect the simulated players
//! 4. Reload the hazard, installing the sampler on the Tokio scheduler
//! 5. Register the chance placeholder
//! 6. Run the hazard tick loop until `max-ticks` or Ctrl-C
//! 7. Log totals and the placeholder readout

mod config;
mod error;
mod world;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hypoxia_core::memory::MemoryHost;
use hypoxia_core::{Configuration, DepthHypoxia, PlaceholderRegistry, Players, Rnd, TokioScheduler};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::world::Simulation;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "HYPOXIA_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset.
const DEFAULT_CONFIG_PATH: &str = "hypoxia-config.yaml";

/// Running totals over the whole run.
#[derive(Debug, Default)]
struct Totals {
    ticks: u64,
    evaluated: u64,
    afflicted: u64,
    effects: u64,
    messages: u64,
    departures: u64,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or no runtime is
/// available for the sampler.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("hypoxia-engine starting");

    // 2. Load configuration.
    let path = config_path();
    let config = load_config(&path)?;
    let engine = config.section::<EngineConfig>()?;
    info!(
        path = %path.display(),
        seed = engine.seed,
        game_tick_ms = engine.game_tick_ms,
        hazard_period = engine.hazard_period,
        players = engine.players,
        "Configuration loaded"
    );

    // 3. Build the host.
    let host = Arc::new(Simulation::build_host(&engine));
    let mut simulation = Simulation::new(
        Arc::clone(&host),
        engine.clone(),
        StdRng::seed_from_u64(engine.seed),
    );
    info!(players = host.player_count(), worlds = ?host.world_names(), "Simulated server ready");

    // 4. Arm the hazard.
    let game_tick = Duration::from_millis(engine.game_tick_ms.max(1));
    let scheduler = TokioScheduler::current(game_tick).ok_or(EngineError::NoRuntime)?;
    let mut hazard = DepthHypoxia::new(Arc::clone(&host));
    let report = hazard.reload(&config, &scheduler)?;
    info!(
        enabled = report.enabled,
        evaluator = ?report.evaluator,
        default_formula = report.formula_fallback.is_some(),
        "Hazard armed"
    );

    // 5. Register placeholders.
    let mut registry = PlaceholderRegistry::new();
    registry.register(hazard.placeholder());

    // 6. Tick loop.
    let totals = run(&mut hazard, &mut simulation, &scheduler, &engine, &path).await;

    // 7. Report.
    hazard.shutdown();
    info!(
        ticks = totals.ticks,
        evaluated = totals.evaluated,
        afflicted = totals.afflicted,
        effects = totals.effects,
        messages = totals.messages,
        departures = totals.departures,
        "Simulation finished"
    );
    for player in host.online_players() {
        info!(
            player = %player.name,
            world = %player.location.world,
            y = player.location.y,
            chance = %registry.expand("%hypoxia_chance%", player.id),
            "Hypoxia chance"
        );
    }

    info!("hypoxia-engine shutdown complete");
    Ok(())
}

/// Drive hazard ticks until the tick limit or Ctrl-C.
async fn run(
    hazard: &mut DepthHypoxia<MemoryHost>,
    simulation: &mut Simulation,
    scheduler: &TokioScheduler,
    engine: &EngineConfig,
    path: &Path,
) -> Totals {
    let mut totals = Totals::default();
    let mut rng = Rnd(StdRng::seed_from_u64(engine.seed.wrapping_add(1)));
    let period = scheduler.tick().saturating_mul(engine.hazard_period.max(1));
    let mut interval = tokio::time::interval(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if engine.max_ticks > 0 && totals.ticks >= engine.max_ticks {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted, stopping");
                break;
            }
        }

        for id in simulation.step() {
            hazard.on_player_quit(id);
            totals.departures = totals.departures.saturating_add(1);
        }

        let report = hazard.tick(&mut rng);
        totals.ticks = totals.ticks.saturating_add(1);
        totals.evaluated = totals.evaluated.saturating_add(u64::from(report.evaluated));
        totals.afflicted = totals.afflicted.saturating_add(u64::from(report.afflicted));
        totals.messages = totals.messages.saturating_add(u64::from(report.messages_sent));

        // Drain the host's delivery log so a long run stays bounded.
        let host = simulation.host();
        let effects = host.take_effects();
        let delivered = host.take_messages();
        debug!(effects = effects.len(), delivered = delivered.len(), "host log drained");
        totals.effects = totals
            .effects
            .saturating_add(u64::try_from(effects.len()).unwrap_or(u64::MAX));

        if engine.reload_every > 0 && totals.ticks.checked_rem(engine.reload_every) == Some(0) {
            reload(hazard, scheduler, path);
        }
    }
    totals
}

/// Re-read the configuration file and apply it, keeping the current
/// settings if it cannot be read.
fn reload(hazard: &mut DepthHypoxia<MemoryHost>, scheduler: &TokioScheduler, path: &Path) {
    let result = load_config(path).and_then(|config| hazard.reload(&config, scheduler).map_err(EngineError::from));
    match result {
        Ok(report) => info!(enabled = report.enabled, sampler = report.sampler.is_some(), "Configuration reloaded"),
        Err(e) => warn!(error = %e, "reload failed, keeping previous settings"),
    }
}

/// Path of the configuration file.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the configuration document, or an empty one if the file is absent.
fn load_config(path: &Path) -> Result<Configuration, EngineError> {
    if path.exists() {
        Ok(Configuration::from_file(path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(Configuration::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("does-not-exist.yaml")).unwrap();
        assert_eq!(config.section::<EngineConfig>().unwrap(), EngineConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_at_tick_limit() {
        let engine = EngineConfig {
            players: 4,
            max_ticks: 5,
            game_tick_ms: 10,
            hazard_period: 2,
            ..EngineConfig::default()
        };
        let host = Arc::new(Simulation::build_host(&engine));
        let mut simulation =
            Simulation::new(Arc::clone(&host), engine.clone(), StdRng::seed_from_u64(3));
        let scheduler = TokioScheduler::current(Duration::from_millis(10)).unwrap();
        let mut hazard = DepthHypoxia::new(Arc::clone(&host));
        let yaml = "caverns:\n  hypoxia:\n    worlds: ['*']\n";
        hazard
            .reload(&Configuration::parse(yaml).unwrap(), &scheduler)
            .unwrap();
        assert!(hazard.is_enabled());

        let totals = run(
            &mut hazard,
            &mut simulation,
            &scheduler,
            &engine,
            Path::new("does-not-exist.yaml"),
        )
        .await;
        assert_eq!(totals.ticks, 5);
        assert!(totals.evaluated >= 5);
        assert_eq!(totals.effects, totals.afflicted.saturating_mul(2));
        assert!(host.effects().is_empty());
        assert!(host.messages().is_empty());
    }
}
