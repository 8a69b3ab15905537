//! Core value structs exchanged with the host.

use serde::{Deserialize, Serialize};

use crate::enums::EffectKind;
use crate::ids::PlayerId;

/// A position inside a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the world the position belongs to.
    pub world: String,
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate. Lower is deeper.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl Location {
    /// Create a location in `world` at the given coordinates.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

/// A non-empty inventory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Number of items in the stack.
    pub amount: u32,
    /// Largest stack this item type can form.
    pub max_stack_size: u32,
}

impl ItemStack {
    /// Create a stack of `amount` items of a type that stacks to `max_stack_size`.
    pub const fn new(amount: u32, max_stack_size: u32) -> Self {
        Self {
            amount,
            max_stack_size,
        }
    }
}

/// Ephemeral view of a player taken for one evaluation.
///
/// Hosts build a fresh snapshot every time they enumerate players; nothing
/// here is persisted by the hazard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Stable player identity.
    pub id: PlayerId,
    /// Display name, substituted for `%player` in messages.
    pub name: String,
    /// Current position.
    pub location: Location,
    /// Every inventory slot, `None` for empty ones.
    pub inventory: Vec<Option<ItemStack>>,
}

/// A timed status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotionEffect {
    /// What the effect does.
    pub kind: EffectKind,
    /// Duration in game ticks.
    pub duration_ticks: u32,
    /// Zero-based strength level.
    pub amplifier: u8,
}

impl PotionEffect {
    /// Create an effect of `kind` lasting `duration_ticks` at `amplifier`.
    pub const fn new(kind: EffectKind, duration_ticks: u32, amplifier: u8) -> Self {
        Self {
            kind,
            duration_ticks,
            amplifier,
        }
    }
}
