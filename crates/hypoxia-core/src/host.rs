//! Collaborator traits implemented by the host game server.
//!
//! The hazard never reaches into global state: players, terrain, region
//! permissions, effect delivery and randomness all come in through these
//! traits. [`Host`] bundles the world-facing ones so a single shared object
//! can be handed to both the main tick and the sampler task.

use hypoxia_types::{CheckType, Location, MessageChannel, PlayerId, PlayerSnapshot, PotionEffect};
use rand::Rng;

/// Player and world enumeration.
pub trait Players {
    /// Names of every loaded world.
    fn world_names(&self) -> Vec<String>;

    /// Snapshots of the players currently in `world`.
    fn players_in(&self, world: &str) -> Vec<PlayerSnapshot>;

    /// Snapshots of every connected player, across all worlds.
    fn online_players(&self) -> Vec<PlayerSnapshot>;
}

/// Spatial classification.
pub trait Terrain {
    /// Whether `location` is inside a cave.
    fn is_cave(&self, location: &Location) -> bool;
}

/// Region protection.
pub trait Regions {
    /// Whether the `check` capability is allowed at `location`.
    fn check(&self, check: CheckType, location: &Location) -> bool;
}

/// Effect and message delivery.
pub trait Effects {
    /// Apply a status effect to a player.
    fn add_effect(&self, player: PlayerId, effect: &PotionEffect);

    /// Send a chat line to a player.
    fn send_message(&self, player: PlayerId, text: &str);

    /// Show an action bar overlay to a player.
    fn send_action_bar(&self, player: PlayerId, text: &str);

    /// Deliver `text` on the given channel.
    fn deliver(&self, player: PlayerId, channel: MessageChannel, text: &str) {
        match channel {
            MessageChannel::Chat => self.send_message(player, text),
            MessageChannel::ActionBar => self.send_action_bar(player, text),
        }
    }
}

/// Everything the hazard needs from the host, shareable across tasks.
pub trait Host: Players + Terrain + Regions + Effects + Send + Sync {}

impl<T> Host for T where T: Players + Terrain + Regions + Effects + Send + Sync + ?Sized {}

/// Source of random decisions.
pub trait RandomSource {
    /// `true` with probability `probability`. Values at or below 0 never
    /// succeed, values at or above 1 always do.
    fn chance(&mut self, probability: f64) -> bool;

    /// A uniformly random index below `len`, or `None` when `len` is 0.
    fn pick_index(&mut self, len: usize) -> Option<usize>;
}

/// [`RandomSource`] backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct Rnd<R>(pub R);

impl<R: Rng> RandomSource for Rnd<R> {
    fn chance(&mut self, probability: f64) -> bool {
        self.0.random::<f64>() < probability
    }

    fn pick_index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.0.random_range(0..len))
    }
}
