//! In-memory host and scripted randomness.
//!
//! [`MemoryHost`] implements every collaborator trait over a plain player
//! table, recording applied effects and delivered messages so callers can
//! inspect them afterwards. It backs the headless engine and the test
//! suites. [`ScriptedRandom`] replays queued outcomes instead of drawing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::RwLock;

use hypoxia_types::{CheckType, Location, MessageChannel, PlayerId, PlayerSnapshot, PotionEffect};

use crate::host::{Effects, Players, RandomSource, Regions, Terrain};

/// How [`MemoryHost`] classifies caves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaveRule {
    /// Every location is a cave.
    Always,
    /// No location is a cave.
    Never,
    /// Locations strictly below this Y are caves.
    Below(f64),
}

impl CaveRule {
    fn classifies(self, location: &Location) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Below(ceiling) => location.y < ceiling,
        }
    }
}

/// A message handed to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    /// Recipient.
    pub player: PlayerId,
    /// Chat or action bar.
    pub channel: MessageChannel,
    /// Text as delivered.
    pub text: String,
}

#[derive(Debug)]
struct HostState {
    worlds: Vec<String>,
    players: BTreeMap<PlayerId, PlayerSnapshot>,
    cave: CaveRule,
    protected: BTreeSet<String>,
    effects: Vec<(PlayerId, PotionEffect)>,
    messages: Vec<DeliveredMessage>,
}

/// A server held entirely in memory.
#[derive(Debug)]
pub struct MemoryHost {
    state: RwLock<HostState>,
}

impl MemoryHost {
    /// Host with the given worlds, no players, and every location a cave.
    pub fn new<I, S>(worlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: RwLock::new(HostState {
                worlds: worlds.into_iter().map(Into::into).collect(),
                players: BTreeMap::new(),
                cave: CaveRule::Always,
                protected: BTreeSet::new(),
                effects: Vec::new(),
                messages: Vec::new(),
            }),
        }
    }

    /// Change how caves are classified.
    pub fn set_cave_rule(&self, rule: CaveRule) {
        if let Ok(mut state) = self.state.write() {
            state.cave = rule;
        }
    }

    /// Forbid applying effects anywhere in `world`.
    pub fn protect_world(&self, world: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.protected.insert(world.into());
        }
    }

    /// Connect a player, replacing any existing one with the same ID.
    pub fn add_player(&self, player: PlayerSnapshot) {
        if let Ok(mut state) = self.state.write() {
            state.players.insert(player.id, player);
        }
    }

    /// Disconnect a player.
    pub fn remove_player(&self, id: PlayerId) -> Option<PlayerSnapshot> {
        let Ok(mut state) = self.state.write() else {
            return None;
        };
        state.players.remove(&id)
    }

    /// Current snapshot of a player.
    pub fn player(&self, id: PlayerId) -> Option<PlayerSnapshot> {
        self.state.read().ok()?.players.get(&id).cloned()
    }

    /// IDs of every connected player, in ID order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.state
            .read()
            .map_or_else(|_| Vec::new(), |state| state.players.keys().copied().collect())
    }

    /// Number of connected players.
    pub fn player_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.players.len())
    }

    /// Mutate a connected player in place. Returns whether the player exists.
    pub fn update_player<F>(&self, id: PlayerId, update: F) -> bool
    where
        F: FnOnce(&mut PlayerSnapshot),
    {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        state.players.get_mut(&id).map(update).is_some()
    }

    /// Move a connected player.
    pub fn set_location(&self, id: PlayerId, location: Location) -> bool {
        self.update_player(id, |player| player.location = location)
    }

    /// Every effect applied so far.
    pub fn effects(&self) -> Vec<(PlayerId, PotionEffect)> {
        self.state
            .read()
            .map_or_else(|_| Vec::new(), |state| state.effects.clone())
    }

    /// Every message delivered so far.
    pub fn messages(&self) -> Vec<DeliveredMessage> {
        self.state
            .read()
            .map_or_else(|_| Vec::new(), |state| state.messages.clone())
    }

    /// Remove and return the recorded effects.
    pub fn take_effects(&self) -> Vec<(PlayerId, PotionEffect)> {
        self.state
            .write()
            .map_or_else(|_| Vec::new(), |mut state| std::mem::take(&mut state.effects))
    }

    /// Remove and return the recorded messages.
    pub fn take_messages(&self) -> Vec<DeliveredMessage> {
        self.state
            .write()
            .map_or_else(|_| Vec::new(), |mut state| std::mem::take(&mut state.messages))
    }

    fn record_message(&self, player: PlayerId, channel: MessageChannel, text: &str) {
        if let Ok(mut state) = self.state.write() {
            state.messages.push(DeliveredMessage {
                player,
                channel,
                text: text.to_owned(),
            });
        }
    }
}

impl Players for MemoryHost {
    fn world_names(&self) -> Vec<String> {
        self.state
            .read()
            .map_or_else(|_| Vec::new(), |state| state.worlds.clone())
    }

    fn players_in(&self, world: &str) -> Vec<PlayerSnapshot> {
        self.state.read().map_or_else(
            |_| Vec::new(),
            |state| {
                state
                    .players
                    .values()
                    .filter(|player| player.location.world == world)
                    .cloned()
                    .collect()
            },
        )
    }

    fn online_players(&self) -> Vec<PlayerSnapshot> {
        self.state
            .read()
            .map_or_else(|_| Vec::new(), |state| state.players.values().cloned().collect())
    }
}

impl Terrain for MemoryHost {
    fn is_cave(&self, location: &Location) -> bool {
        self.state
            .read()
            .is_ok_and(|state| state.cave.classifies(location))
    }
}

impl Regions for MemoryHost {
    fn check(&self, check: CheckType, location: &Location) -> bool {
        match check {
            CheckType::Effect => self
                .state
                .read()
                .is_ok_and(|state| !state.protected.contains(&location.world)),
            CheckType::Entity | CheckType::Block => true,
        }
    }
}

impl Effects for MemoryHost {
    fn add_effect(&self, player: PlayerId, effect: &PotionEffect) {
        if let Ok(mut state) = self.state.write() {
            state.effects.push((player, *effect));
        }
    }

    fn send_message(&self, player: PlayerId, text: &str) {
        self.record_message(player, MessageChannel::Chat, text);
    }

    fn send_action_bar(&self, player: PlayerId, text: &str) {
        self.record_message(player, MessageChannel::ActionBar, text);
    }
}

// ---------------------------------------------------------------------------
// Scripted randomness
// ---------------------------------------------------------------------------

/// Replays queued outcomes; falls back to a fixed answer once they run out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    chances: VecDeque<bool>,
    picks: VecDeque<usize>,
    fallback: bool,
    requested: Vec<f64>,
}

impl ScriptedRandom {
    /// Every `chance` call answers `outcome`, every pick is the first index.
    pub fn always(outcome: bool) -> Self {
        Self {
            fallback: outcome,
            ..Self::default()
        }
    }

    /// Queue `chance` outcomes, consumed in order.
    #[must_use]
    pub fn with_chances(mut self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.chances.extend(outcomes);
        self
    }

    /// Queue `pick_index` results, consumed in order.
    #[must_use]
    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    /// Probabilities passed to `chance`, in call order.
    pub fn requested(&self) -> &[f64] {
        &self.requested
    }
}

impl RandomSource for ScriptedRandom {
    fn chance(&mut self, probability: f64) -> bool {
        self.requested.push(probability);
        self.chances.pop_front().unwrap_or(self.fallback)
    }

    fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let pick = self.picks.pop_front().unwrap_or(0);
        Some(pick.min(len.saturating_sub(1)))
    }
}
