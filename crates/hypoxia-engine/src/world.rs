//! Simulated miners wandering an in-memory server.
//!
//! Players random-walk up and down between the surface and bedrock, pick
//! up and drop items, and occasionally disconnect to be replaced by a
//! newcomer. Departures are reported so the caller can fire the hazard's
//! disconnect hook.

use std::sync::Arc;

use hypoxia_core::memory::{CaveRule, MemoryHost};
use hypoxia_types::{ItemStack, Location, PlayerId, PlayerSnapshot};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::EngineConfig;

/// Slots in a player inventory.
pub const INVENTORY_SLOTS: usize = 36;

const MAX_STACK: u32 = 64;

/// Largest vertical move per hazard tick.
const STEP: f64 = 4.0;

const NAMES: &[&str] = &[
    "Alex", "Steve", "Noor", "Kai", "Mira", "Tobias", "Yuki", "Idris", "Luz", "Petra",
    "Ravi", "Sol",
];

/// Drives player movement and churn on a [`MemoryHost`].
#[derive(Debug)]
pub struct Simulation {
    host: Arc<MemoryHost>,
    config: EngineConfig,
    rng: StdRng,
    joined: u32,
}

impl Simulation {
    /// Build the host described by `config`.
    pub fn build_host(config: &EngineConfig) -> MemoryHost {
        let host = MemoryHost::new(config.worlds.iter().cloned());
        host.set_cave_rule(CaveRule::Below(config.cave_ceiling));
        for world in &config.protected_worlds {
            host.protect_world(world.clone());
        }
        host
    }

    /// Wrap `host` and connect the configured number of players.
    pub fn new(host: Arc<MemoryHost>, config: EngineConfig, rng: StdRng) -> Self {
        let mut simulation = Self {
            host,
            config,
            rng,
            joined: 0,
        };
        for _ in 0..simulation.config.players {
            simulation.join();
        }
        simulation
    }

    /// The simulated server.
    pub fn host(&self) -> &Arc<MemoryHost> {
        &self.host
    }

    /// Advance one hazard tick. Returns the players who disconnected.
    pub fn step(&mut self) -> Vec<PlayerId> {
        let (bedrock, surface) = (self.config.bedrock, self.config.surface);
        for id in self.host.player_ids() {
            let dy = self.rng.random_range(-STEP..=STEP);
            let slot = self.rng.random_range(0..INVENTORY_SLOTS);
            let amount = self.rng.random_range(0..=MAX_STACK);
            self.host.update_player(id, |player| {
                player.location.y = (player.location.y + dy).min(surface).max(bedrock);
                if let Some(stack) = player.inventory.get_mut(slot) {
                    *stack = (amount > 0).then(|| ItemStack::new(amount, MAX_STACK));
                }
            });
        }

        let mut departed = Vec::new();
        if self.rng.random::<f64>() < self.config.churn / 100.0 {
            let ids = self.host.player_ids();
            if !ids.is_empty() {
                let index = self.rng.random_range(0..ids.len());
                if let Some(player) = ids.get(index).and_then(|&id| self.host.remove_player(id)) {
                    debug!(player = %player.name, "player disconnected");
                    departed.push(player.id);
                }
                self.join();
            }
        }
        departed
    }

    fn join(&mut self) {
        let world = match self.config.worlds.len() {
            0 => String::from("world"),
            len => self
                .config
                .worlds
                .get(self.rng.random_range(0..len))
                .cloned()
                .unwrap_or_default(),
        };
        let y = self.rng.random_range(self.config.bedrock.min(self.config.surface)..=self.config.surface);
        let filled = self.rng.random_range(0..=INVENTORY_SLOTS);
        let mut inventory = vec![None; INVENTORY_SLOTS];
        for slot in inventory.iter_mut().take(filled) {
            *slot = Some(ItemStack::new(self.rng.random_range(1..=MAX_STACK), MAX_STACK));
        }

        let base = NAMES
            .get(self.rng.random_range(0..NAMES.len()))
            .copied()
            .unwrap_or("Miner");
        self.joined = self.joined.saturating_add(1);
        let player = PlayerSnapshot {
            id: PlayerId::new(),
            name: format!("{base}{}", self.joined),
            location: Location::new(world, 0.0, y, 0.0),
            inventory,
        };
        debug!(player = %player.name, y, "player joined");
        self.host.add_player(player);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hypoxia_core::Players;
    use rand::SeedableRng;

    use super::*;

    fn simulation(config: EngineConfig) -> Simulation {
        let host = Arc::new(Simulation::build_host(&config));
        Simulation::new(host, config, StdRng::seed_from_u64(1))
    }

    #[test]
    fn connects_configured_players() {
        let sim = simulation(EngineConfig {
            players: 5,
            ..EngineConfig::default()
        });
        let players = sim.host().online_players();
        assert_eq!(players.len(), 5);
        assert!(players.iter().all(|p| p.inventory.len() == INVENTORY_SLOTS));
        assert!(players.iter().all(|p| p.location.world.starts_with("world")));
    }

    #[test]
    fn players_stay_between_bedrock_and_surface() {
        let mut sim = simulation(EngineConfig {
            players: 6,
            churn: 0.0,
            ..EngineConfig::default()
        });
        for _ in 0..200 {
            assert!(sim.step().is_empty());
        }
        for player in sim.host().online_players() {
            assert!((-60.0..=80.0).contains(&player.location.y));
        }
    }

    #[test]
    fn full_churn_replaces_a_player_every_step() {
        let mut sim = simulation(EngineConfig {
            players: 4,
            churn: 100.0,
            ..EngineConfig::default()
        });
        for _ in 0..10 {
            let departed = sim.step();
            assert_eq!(departed.len(), 1);
            assert!(sim.host().player(*departed.first().unwrap()).is_none());
            assert_eq!(sim.host().player_count(), 4);
        }
    }

    #[test]
    fn protected_worlds_are_applied() {
        use hypoxia_core::Regions;
        use hypoxia_types::CheckType;

        let host = Simulation::build_host(&EngineConfig {
            protected_worlds: vec!["world_nether".to_owned()],
            ..EngineConfig::default()
        });
        let nether = Location::new("world_nether", 0.0, 10.0, 0.0);
        let overworld = Location::new("world", 0.0, 10.0, 0.0);
        assert!(!host.check(CheckType::Effect, &nether));
        assert!(host.check(CheckType::Effect, &overworld));
    }
}
