//! Depth hypoxia: a periodic suffocation hazard for players deep in caves.
//!
//! Players below a configured depth ceiling who are inside a cave face a
//! chance, driven by depth and inventory load, of being slowed. The crate
//! owns the decision core and leaves world access, effects, messaging,
//! region permissions and scheduling to the host through small traits.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration tree and the typed hazard sections.
//! - [`formula`] -- Arithmetic expression parser and evaluator.
//! - [`chance`] -- Chance model blending depth and inventory load.
//! - [`eligibility`] -- Cave, depth and region gate.
//! - [`hazard`] -- Two-stage hazard evaluator and the [`DepthHypoxia`] tickable.
//! - [`cache`] -- Live chance cache exposed as the `hypoxia_chance` placeholder.
//! - [`placeholder`] -- Placeholder trait and `%name%` expansion.
//! - [`schedule`] -- Repeating-task scheduler abstraction and Tokio backend.
//! - [`sampler`] -- Independent chance sampler that keeps the cache warm.
//! - [`host`] -- Collaborator traits the host implements.
//! - [`memory`] -- In-memory host and scripted randomness.
//! - [`text`] -- Legacy color code translation for messages.
//!
//! [`DepthHypoxia`]: hazard::DepthHypoxia

pub mod cache;
pub mod chance;
pub mod config;
pub mod eligibility;
pub mod formula;
pub mod hazard;
pub mod host;
pub mod memory;
pub mod placeholder;
pub mod sampler;
pub mod schedule;
pub mod text;

pub use cache::ChanceCache;
pub use config::{ChancePlaceholderConfig, ConfigError, Configuration, HypoxiaConfig, Section};
pub use hazard::{DepthHypoxia, Evaluator, HazardSettings, ReloadReport, TickReport};
pub use host::{Effects, Host, Players, RandomSource, Regions, Rnd, Terrain};
pub use placeholder::{Placeholder, PlaceholderRegistry};
pub use schedule::{Scheduler, TaskHandle, TokioScheduler};
