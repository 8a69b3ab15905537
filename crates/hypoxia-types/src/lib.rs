//! Shared type definitions for the depth hypoxia hazard.
//!
//! Everything the hazard core exchanges with its host lives here: player
//! identity, locations, inventory slots, potion effects, and the small
//! enumerations used at the collaborator boundary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for players and scheduled tasks
//! - [`enums`] -- Region check kinds, effect kinds, message channels
//! - [`structs`] -- Locations, item stacks, player snapshots, potion effects

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CheckType, EffectKind, MessageChannel};
pub use ids::{PlayerId, TaskId};
pub use structs::{ItemStack, Location, PlayerSnapshot, PotionEffect};
