//! Live chance cache behind the `hypoxia_chance` placeholder.
//!
//! Entries hold the last computed chance per player as a percentage string.
//! The cache is written by the main hazard tick and by the independent
//! sampler, possibly from different threads, so the map sits behind a lock;
//! last write wins. Entries are removed when a player leaves the hazard
//! zone or disconnects, which keeps the map bounded by the online
//! population.
//!
//! Every reload starts a new generation. Background writers stamp their
//! writes with the generation they were started under, and writes from an
//! older generation are dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use hypoxia_types::PlayerId;

use crate::placeholder::Placeholder;

/// Name the cache is registered under.
pub const PLACEHOLDER_NAME: &str = "hypoxia_chance";

/// Value reported for players without an entry.
pub const ABSENT_VALUE: &str = "0.0";

/// Scale used when the try chance is not folded in.
const FULL_SCALE: f64 = 10_000.0;

/// Scale factor applied before flooring to two decimal places.
///
/// With `respect_try_chance` the stored value is the compounded probability
/// of the try gate and the severity gate both passing.
pub fn scale_for(respect_try_chance: bool, try_chance: f64) -> f64 {
    if respect_try_chance {
        FULL_SCALE * try_chance
    } else {
        FULL_SCALE
    }
}

/// `floor(raw * scale) / 100`, always printed with a fractional part.
pub fn format_chance(raw: f64, scale: f64) -> String {
    let percent = (raw * scale).floor() / 100.0;
    let text = percent.to_string();
    if text.contains(['.', 'e', 'N', 'i']) {
        text
    } else {
        format!("{text}.0")
    }
}

#[derive(Debug)]
struct CacheState {
    scale: f64,
    generation: u64,
    entries: HashMap<PlayerId, String>,
}

/// Per-player chance snapshots, keyed by stable player identity.
#[derive(Debug)]
pub struct ChanceCache {
    state: RwLock<CacheState>,
}

impl ChanceCache {
    /// Empty cache reporting the severity chance alone.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState {
                scale: FULL_SCALE,
                generation: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// Apply a reload: set the scale, drop every entry and start a new
    /// generation. Returns the new generation.
    pub fn configure(&self, respect_try_chance: bool, try_chance: f64) -> u64 {
        let Ok(mut state) = self.state.write() else {
            return self.generation();
        };
        state.scale = scale_for(respect_try_chance, try_chance);
        state.generation = state.generation.wrapping_add(1);
        state.entries.clear();
        state.generation
    }

    /// Generation started by the last [`ChanceCache::configure`].
    pub fn generation(&self) -> u64 {
        self.state.read().map_or(0, |state| state.generation)
    }

    /// Store the formatted form of `raw_chance` for `player`.
    pub fn put(&self, player: PlayerId, raw_chance: f64) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let value = format_chance(raw_chance, state.scale);
        state.entries.insert(player, value);
    }

    /// As [`ChanceCache::put`], unless the cache has moved past
    /// `generation`. Returns whether the write landed.
    pub fn put_in(&self, generation: u64, player: PlayerId, raw_chance: f64) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.generation != generation {
            return false;
        }
        let value = format_chance(raw_chance, state.scale);
        state.entries.insert(player, value);
        true
    }

    /// The cached value for `player`, or [`ABSENT_VALUE`].
    pub fn get(&self, player: PlayerId) -> String {
        self.state
            .read()
            .ok()
            .and_then(|state| state.entries.get(&player).cloned())
            .unwrap_or_else(|| ABSENT_VALUE.to_owned())
    }

    /// Whether `player` has an entry.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.state
            .read()
            .is_ok_and(|state| state.entries.contains_key(&player))
    }

    /// Remove `player`'s entry. Returns whether one existed.
    pub fn evict(&self, player: PlayerId) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        state.entries.remove(&player).is_some()
    }

    /// As [`ChanceCache::evict`], unless the cache has moved past
    /// `generation`. Returns whether `generation` is still current.
    pub fn evict_in(&self, generation: u64, player: PlayerId) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if state.generation != generation {
            return false;
        }
        state.entries.remove(&player);
        true
    }

    /// Number of players with an entry.
    pub fn len(&self) -> usize {
        self.state.read().map_or(0, |state| state.entries.len())
    }

    /// Whether no player has an entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Placeholder for ChanceCache {
    fn name(&self) -> &str {
        PLACEHOLDER_NAME
    }

    fn value(&self, player: PlayerId) -> String {
        self.get(player)
    }
}
