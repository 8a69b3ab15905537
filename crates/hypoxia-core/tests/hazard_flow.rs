//! End-to-end flow: YAML configuration, reload, ticks, placeholder readout.
//!
//! Runs against the in-memory host with scripted randomness and a manual
//! scheduler so every outcome is deterministic.

#![allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing,
    clippy::too_many_lines
)]

use std::sync::Arc;
use std::time::Duration;

use hypoxia_core::cache::PLACEHOLDER_NAME;
use hypoxia_core::hazard::{SLOW, SLOW_DIGGING};
use hypoxia_core::memory::{CaveRule, MemoryHost, ScriptedRandom};
use hypoxia_core::schedule::ManualScheduler;
use hypoxia_core::{
    ConfigError, Configuration, DepthHypoxia, Evaluator, PlaceholderRegistry, Rnd, TokioScheduler,
};
use hypoxia_types::{ItemStack, Location, MessageChannel, PlayerId, PlayerSnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;

const CONFIG: &str = r"
caverns:
  hypoxia:
    enabled: true
    try-chance: 60
    chance-max: 90
    chance-min: 10
    y-max: 42
    actionbar: false
    messages:
      - '&7%player gasps for air'
    worlds:
      - world
    chance-formula: 'depth*inventory'
integration:
  placeholders:
    hypoxia-chance:
      enabled: true
      respect-try-chance: true
      schedule: 100
";

fn miner(name: &str, y: f64, filled_slots: usize) -> PlayerSnapshot {
    let mut inventory = vec![None; 36];
    for slot in inventory.iter_mut().take(filled_slots) {
        *slot = Some(ItemStack::new(64, 64));
    }
    PlayerSnapshot {
        id: PlayerId::new(),
        name: name.to_owned(),
        location: Location::new("world", 0.0, y, 0.0),
        inventory,
    }
}

fn setup() -> (Arc<MemoryHost>, DepthHypoxia<MemoryHost>, ManualScheduler, PlaceholderRegistry) {
    let host = Arc::new(MemoryHost::new(["world", "world_nether"]));
    host.set_cave_rule(CaveRule::Below(60.0));
    let scheduler = ManualScheduler::new();
    let mut hazard = DepthHypoxia::new(Arc::clone(&host));
    let config = Configuration::parse(CONFIG).unwrap();
    let report = hazard.reload(&config, &scheduler).unwrap();
    assert!(report.enabled);
    assert_eq!(report.evaluator, Evaluator::Observed);
    assert!(report.sampler.is_some());
    assert!(report.formula_fallback.is_none());

    let mut registry = PlaceholderRegistry::new();
    registry.register(hazard.placeholder());
    (host, hazard, scheduler, registry)
}

#[test]
fn tick_afflicts_and_placeholder_reports() {
    let (host, hazard, _scheduler, registry) = setup();
    let steve = miner("Steve", 0.0, 36);
    let id = steve.id;
    host.add_player(steve);

    // Try gate and severity gate both pass.
    let mut rng = ScriptedRandom::always(true);
    let report = hazard.tick(&mut rng);
    assert_eq!(report.afflicted, 1);
    assert_eq!(report.messages_sent, 1);

    assert_eq!(host.effects(), vec![(id, SLOW), (id, SLOW_DIGGING)]);
    let messages = host.messages();
    assert_eq!(messages[0].channel, MessageChannel::Chat);
    assert_eq!(messages[0].text, "§7Steve gasps for air");

    // Chance 0.9 compounded with the 0.6 try chance.
    let text = registry.expand("Air: %hypoxia_chance%%", id);
    assert_eq!(text, "Air: 54.0%");
}

#[test]
fn unknown_player_reads_zero() {
    let (_host, _hazard, _scheduler, registry) = setup();
    assert_eq!(
        registry.resolve(PLACEHOLDER_NAME, PlayerId::new()).as_deref(),
        Some("0.0")
    );
}

#[test]
fn sampler_keeps_cache_warm_between_ticks() {
    let (host, hazard, scheduler, registry) = setup();
    let alex = miner("Alex", 21.0, 18);
    let id = alex.id;
    host.add_player(alex);

    assert_eq!(registry.resolve(PLACEHOLDER_NAME, id).as_deref(), Some("0.0"));
    scheduler.run_active();
    // depth factor 0.5 * load 0.5 = 0.25, times 6000, floored, / 100.
    assert_eq!(registry.resolve(PLACEHOLDER_NAME, id).as_deref(), Some("15.0"));

    // Climbing out of the hazard zone evicts on the next pass.
    host.set_location(id, Location::new("world", 0.0, 70.0, 0.0));
    scheduler.run_active();
    assert_eq!(registry.resolve(PLACEHOLDER_NAME, id).as_deref(), Some("0.0"));
    assert!(hazard.placeholder().is_empty());
}

#[test]
fn disconnect_leaves_no_entry_behind() {
    let (host, hazard, _scheduler, _registry) = setup();
    let mut ids = Vec::new();
    for index in 0..20 {
        let player = miner(&format!("p{index}"), 5.0, 10);
        ids.push(player.id);
        host.add_player(player);
    }
    hazard.tick(&mut ScriptedRandom::always(false));
    assert_eq!(hazard.placeholder().len(), 20);

    for id in ids {
        host.remove_player(id);
        hazard.on_player_quit(id);
    }
    assert!(hazard.placeholder().is_empty());
}

#[test]
fn reload_with_disabled_placeholder_stops_sampler() {
    let (_host, mut hazard, scheduler, _registry) = setup();
    assert_eq!(scheduler.active_count(), 1);

    let yaml = CONFIG.replace("      enabled: true\n      respect", "      enabled: false\n      respect");
    let config = Configuration::parse(&yaml).unwrap();
    let report = hazard.reload(&config, &scheduler).unwrap();
    assert_eq!(report.evaluator, Evaluator::Plain);
    assert!(report.sampler.is_none());
    assert_eq!(scheduler.active_count(), 0);
}

#[test]
fn malformed_section_keeps_previous_settings() {
    let (_host, mut hazard, scheduler, _registry) = setup();
    let config = Configuration::parse("caverns:\n  hypoxia:\n    y-max: deep\n").unwrap();
    let err = hazard.reload(&config, &scheduler).unwrap_err();
    assert!(matches!(err, ConfigError::Section { path: "caverns.hypoxia", .. }));
    assert!(hazard.is_enabled());
    assert_eq!(scheduler.active_count(), 1);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = |seed: u64| {
        let (host, hazard, _scheduler, _registry) = setup();
        for index in 0..10 {
            let depth = f64::from(index) * 4.0;
            host.add_player(miner(&format!("p{index}"), depth, 30));
        }
        let mut rng = Rnd(StdRng::seed_from_u64(seed));
        (0..50)
            .map(|_| hazard.tick(&mut rng).afflicted)
            .collect::<Vec<_>>()
    };
    let first = run(7);
    assert_eq!(first, run(7));
    assert!(first.iter().all(|&afflicted| afflicted <= 10));
    assert!(first.iter().any(|&afflicted| afflicted > 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_mid_pass_leaves_no_stale_entries() {
    let host = Arc::new(MemoryHost::new(["world"]));
    host.set_cave_rule(CaveRule::Below(60.0));
    for index in 0..50_000 {
        host.add_player(miner(&format!("p{index}"), 10.0, 4));
    }
    let scheduler = TokioScheduler::current(Duration::from_millis(1)).unwrap();
    let mut hazard = DepthHypoxia::new(Arc::clone(&host));
    let sampling = CONFIG.replace("schedule: 100", "schedule: 1");
    let report = hazard
        .reload(&Configuration::parse(&sampling).unwrap(), &scheduler)
        .unwrap();
    assert!(report.sampler.is_some());

    let cache = hazard.placeholder();
    tokio::time::timeout(Duration::from_secs(30), async {
        while cache.is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    let off = sampling.replace("      enabled: true\n      respect", "      enabled: false\n      respect");
    let report = hazard
        .reload(&Configuration::parse(&off).unwrap(), &scheduler)
        .unwrap();
    assert!(report.sampler.is_none());
    assert_eq!(report.evaluator, Evaluator::Plain);
    assert!(!hazard.sampler_running());
    assert!(cache.is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(cache.is_empty());
    assert_eq!(cache.get(host.player_ids()[0]), "0.0");
}
