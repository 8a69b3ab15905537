//! The `engine` section: how the simulated server is shaped and clocked.

use hypoxia_core::Section;
use serde::Deserialize;

/// Simulation settings under `engine`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Seed for both the world simulation and the hazard's draws.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Wall-clock length of one game tick in milliseconds.
    #[serde(default = "default_game_tick_ms")]
    pub game_tick_ms: u64,

    /// Game ticks between two main hazard ticks.
    #[serde(default = "default_hazard_period")]
    pub hazard_period: u32,

    /// Hazard ticks to run before stopping. 0 runs until interrupted.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Players connected at start.
    #[serde(default = "default_players")]
    pub players: u32,

    /// Worlds the server has loaded.
    #[serde(default = "default_worlds")]
    pub worlds: Vec<String>,

    /// Locations strictly below this Y count as caves.
    #[serde(default = "default_cave_ceiling")]
    pub cave_ceiling: f64,

    /// Worlds where region protection forbids effects.
    #[serde(default)]
    pub protected_worlds: Vec<String>,

    /// Highest Y a player wanders to.
    #[serde(default = "default_surface")]
    pub surface: f64,

    /// Lowest Y a player wanders to.
    #[serde(default = "default_bedrock")]
    pub bedrock: f64,

    /// Percent chance per hazard tick that one player leaves and another joins.
    #[serde(default = "default_churn")]
    pub churn: f64,

    /// Reload the configuration file every this many hazard ticks. 0 never.
    #[serde(default)]
    pub reload_every: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            game_tick_ms: default_game_tick_ms(),
            hazard_period: default_hazard_period(),
            max_ticks: default_max_ticks(),
            players: default_players(),
            worlds: default_worlds(),
            cave_ceiling: default_cave_ceiling(),
            protected_worlds: Vec::new(),
            surface: default_surface(),
            bedrock: default_bedrock(),
            churn: default_churn(),
            reload_every: 0,
        }
    }
}

impl Section for EngineConfig {
    const PATH: &'static str = "engine";
}

const fn default_seed() -> u64 {
    42
}

const fn default_game_tick_ms() -> u64 {
    50
}

const fn default_hazard_period() -> u32 {
    20
}

const fn default_max_ticks() -> u64 {
    120
}

const fn default_players() -> u32 {
    8
}

fn default_worlds() -> Vec<String> {
    vec![String::from("world"), String::from("world_nether")]
}

const fn default_cave_ceiling() -> f64 {
    60.0
}

const fn default_surface() -> f64 {
    80.0
}

const fn default_bedrock() -> f64 {
    -60.0
}

const fn default_churn() -> f64 {
    5.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use hypoxia_core::Configuration;

    use super::*;

    #[test]
    fn missing_section_uses_defaults() {
        let config = Configuration::parse("caverns: {}").unwrap();
        let engine = config.section::<EngineConfig>().unwrap();
        assert_eq!(engine, EngineConfig::default());
        assert_eq!(engine.hazard_period, 20);
        assert_eq!(engine.worlds.len(), 2);
    }

    #[test]
    fn partial_section_overrides() {
        let config = Configuration::parse(
            "engine:\n  seed: 7\n  players: 3\n  protected-worlds: [spawn]\n  reload-every: 10\n",
        )
        .unwrap();
        let engine = config.section::<EngineConfig>().unwrap();
        assert_eq!(engine.seed, 7);
        assert_eq!(engine.players, 3);
        assert_eq!(engine.protected_worlds, vec!["spawn"]);
        assert_eq!(engine.reload_every, 10);
        assert_eq!(engine.cave_ceiling, 60.0);
    }
}
