//! The depth hypoxia hazard.
//!
//! On every main tick, each player in a configured world passes through a
//! two-stage gate: a flat try chance throttles how often the hazard even
//! attempts to trigger, then the depth and load sensitive chance from the
//! [`ChanceModel`] decides whether it lands. Region permission must also
//! allow effects at the player's location. Afflicted players are slowed and
//! optionally told why.
//!
//! Settings are rebuilt wholesale on every reload. Anything that makes the
//! hazard meaningless (explicit disable, zero depth ceiling, zero try or
//! minimum chance, no worlds) collapses into one `enabled` flag that the
//! tick checks before doing anything else.

use std::collections::BTreeSet;
use std::sync::Arc;

use hypoxia_types::{EffectKind, MessageChannel, PlayerId, PlayerSnapshot, PotionEffect, TaskId};
use tracing::{debug, info, trace, warn};

use crate::cache::ChanceCache;
use crate::chance::{ChanceFormula, ChanceModel};
use crate::config::{ChancePlaceholderConfig, ConfigError, Configuration, HypoxiaConfig};
use crate::eligibility::EligibilityGate;
use crate::formula::FormulaError;
use crate::host::{Host, RandomSource, Regions, Terrain};
use crate::sampler::{ChanceSampler, sampling_task};
use crate::schedule::Scheduler;
use crate::text::colorize;

/// Movement slow applied on affliction.
pub const SLOW: PotionEffect = PotionEffect::new(EffectKind::Slow, 120, 1);

/// Mining slow applied on affliction.
pub const SLOW_DIGGING: PotionEffect = PotionEffect::new(EffectKind::SlowDigging, 55, 1);

/// Token in message templates replaced by the player's name.
pub const PLAYER_TOKEN: &str = "%player";

/// World list entry matching every world.
pub const ALL_WORLDS: &str = "*";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Worlds the hazard runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldFilter {
    /// Every world the host has.
    All,
    /// Only these worlds.
    Named(BTreeSet<String>),
}

impl WorldFilter {
    /// Build from configured names. Any `*` entry selects every world.
    pub fn from_names(names: &[String]) -> Self {
        if names.iter().any(|name| name == ALL_WORLDS) {
            Self::All
        } else {
            Self::Named(names.iter().cloned().collect())
        }
    }

    /// Whether the hazard runs in `world`.
    pub fn contains(&self, world: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(world),
        }
    }

    /// Whether no world can match.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Named(names) => names.is_empty(),
        }
    }
}

/// Hazard parameters for one reload, probabilities already in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardSettings {
    /// Derived: the explicit flag and every sanity condition.
    pub enabled: bool,
    /// Probability the hazard attempts to trigger at all.
    pub try_chance: f64,
    /// Where affliction messages are shown.
    pub channel: MessageChannel,
    /// Colorized message templates; one is picked at random.
    pub messages: Vec<String>,
    /// Worlds the hazard runs in.
    pub worlds: WorldFilter,
    /// Cave and depth gate.
    pub gate: EligibilityGate,
    /// Severity chance model.
    pub model: ChanceModel,
}

/// Percent to probability, clamped into `[0, 1]`. NaN reads as 0.
fn probability(percent: f64) -> f64 {
    let value = percent / 100.0;
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

impl HazardSettings {
    /// Build settings from a configuration section.
    ///
    /// An invalid formula is replaced by `depth*inventory` and its error is
    /// returned alongside, never raised.
    pub fn from_config(config: &HypoxiaConfig) -> (Self, Option<FormulaError>) {
        let try_chance = probability(config.try_chance);
        let min_chance = probability(config.chance_min);
        let mut max_chance = probability(config.chance_max);
        if min_chance > max_chance {
            warn!(
                chance_min = config.chance_min,
                chance_max = config.chance_max,
                "chance-min exceeds chance-max, raising chance-max to match"
            );
            max_chance = min_chance;
        }

        let (formula, fallback) = ChanceFormula::compile_or_default(&config.chance_formula);
        if let Some(err) = &fallback {
            warn!(
                formula = %config.chance_formula,
                error = %err,
                "depth hypoxia formula is invalid, using \"depth*inventory\" instead"
            );
        }

        let worlds = WorldFilter::from_names(&config.worlds);
        let enabled = config.enabled
            && config.y_max > 0
            && try_chance > 0.0
            && min_chance > 0.0
            && !worlds.is_empty();

        let settings = Self {
            enabled,
            try_chance,
            channel: MessageChannel::from_actionbar(config.actionbar),
            messages: config.messages.iter().map(|message| colorize(message)).collect(),
            worlds,
            gate: EligibilityGate::new(config.y_max),
            model: ChanceModel {
                y_max: config.y_max,
                min_chance,
                max_chance,
                formula,
            },
        };
        (settings, fallback)
    }

    /// Settings for a hazard that has not been configured yet.
    pub fn disabled() -> Self {
        let config = HypoxiaConfig {
            enabled: false,
            ..HypoxiaConfig::default()
        };
        Self::from_config(&config).0
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Per-player check, chosen once per reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluator {
    /// Zone, try gate, severity gate, permission. No caching.
    Plain,
    /// As [`Evaluator::Plain`], but keeps the chance cache current for
    /// every player it visits.
    Observed,
}

impl Evaluator {
    /// [`Evaluator::Observed`] when the chance placeholder is enabled.
    pub const fn select(placeholder_enabled: bool) -> Self {
        if placeholder_enabled {
            Self::Observed
        } else {
            Self::Plain
        }
    }

    /// Decide whether `player` is afflicted this tick.
    pub fn check<H>(
        self,
        settings: &HazardSettings,
        host: &H,
        player: &PlayerSnapshot,
        rng: &mut dyn RandomSource,
        cache: &ChanceCache,
    ) -> bool
    where
        H: Terrain + Regions + ?Sized,
    {
        let location = &player.location;
        match self {
            Self::Plain => {
                settings.gate.in_hazard_zone(host, location)
                    && rng.chance(settings.try_chance)
                    && rng.chance(settings.model.chance_for(player))
                    && settings.gate.permits(host, location)
            }
            Self::Observed => {
                if !settings.gate.in_hazard_zone(host, location) {
                    cache.evict(player.id);
                    return false;
                }
                let attempted = rng.chance(settings.try_chance);
                let chance = settings.model.chance_for(player);
                cache.put(player.id, chance);
                if !attempted {
                    return false;
                }
                rng.chance(chance) && settings.gate.permits(host, location)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Hazard
// ---------------------------------------------------------------------------

/// What a reload changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadReport {
    /// Whether the hazard will do anything on tick.
    pub enabled: bool,
    /// Evaluator chosen for this reload.
    pub evaluator: Evaluator,
    /// Sampler task installed by this reload, if any.
    pub sampler: Option<TaskId>,
    /// Formula error that forced the default expression.
    pub formula_fallback: Option<FormulaError>,
}

/// Counters for one main tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Players passed to the evaluator.
    pub evaluated: u32,
    /// Players that received the slowing effects.
    pub afflicted: u32,
    /// Messages delivered.
    pub messages_sent: u32,
}

/// The hazard bound to a host.
pub struct DepthHypoxia<H: Host + ?Sized + 'static> {
    host: Arc<H>,
    settings: Arc<HazardSettings>,
    evaluator: Evaluator,
    cache: Arc<ChanceCache>,
    sampler: ChanceSampler,
}

impl<H: Host + ?Sized + 'static> DepthHypoxia<H> {
    /// Unconfigured, disabled hazard. Call [`DepthHypoxia::reload`] to arm it.
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            settings: Arc::new(HazardSettings::disabled()),
            evaluator: Evaluator::Plain,
            cache: Arc::new(ChanceCache::new()),
            sampler: ChanceSampler::new(),
        }
    }

    /// Read both sections from `config` and apply them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Section`] if either section is malformed; the
    /// previous settings stay in effect.
    pub fn reload(&mut self, config: &Configuration, scheduler: &dyn Scheduler) -> Result<ReloadReport, ConfigError> {
        let hazard = config.section::<HypoxiaConfig>()?;
        let placeholder = config.section::<ChancePlaceholderConfig>()?;
        Ok(self.apply(&hazard, &placeholder, scheduler))
    }

    /// Replace all settings.
    ///
    /// The previous sampler is cancelled before anything else. A new one is
    /// installed only when the placeholder is enabled with a positive
    /// schedule and the hazard itself is enabled.
    pub fn apply(
        &mut self,
        hazard: &HypoxiaConfig,
        placeholder: &ChancePlaceholderConfig,
        scheduler: &dyn Scheduler,
    ) -> ReloadReport {
        self.sampler.cancel();

        let (settings, formula_fallback) = HazardSettings::from_config(hazard);
        let settings = Arc::new(settings);
        self.evaluator = Evaluator::select(placeholder.enabled);
        let generation = self
            .cache
            .configure(placeholder.respect_try_chance, settings.try_chance);
        self.settings = Arc::clone(&settings);

        let sampler = match placeholder.period() {
            Some(period) if placeholder.enabled && settings.enabled => {
                let host = Arc::clone(&self.host);
                let cache = Arc::clone(&self.cache);
                Some(self.sampler.start(scheduler, period, |cancel| {
                    sampling_task(host, settings, cache, generation, cancel)
                }))
            }
            _ => None,
        };

        info!(
            enabled = self.settings.enabled,
            evaluator = ?self.evaluator,
            formula = self.settings.model.formula.source(),
            sampler = sampler.is_some(),
            "depth hypoxia reloaded"
        );

        ReloadReport {
            enabled: self.settings.enabled,
            evaluator: self.evaluator,
            sampler,
            formula_fallback,
        }
    }

    /// Run one main tick over every player in a configured world.
    pub fn tick(&self, rng: &mut dyn RandomSource) -> TickReport {
        let mut report = TickReport::default();
        if !self.settings.enabled {
            return report;
        }
        let settings = &*self.settings;
        let host = &*self.host;

        for world in host.world_names() {
            if !settings.worlds.contains(&world) {
                continue;
            }
            for player in host.players_in(&world) {
                report.evaluated = report.evaluated.saturating_add(1);
                if self
                    .evaluator
                    .check(settings, host, &player, rng, &self.cache)
                {
                    self.afflict(settings, &player, rng, &mut report);
                }
            }
        }

        trace!(
            evaluated = report.evaluated,
            afflicted = report.afflicted,
            "depth hypoxia tick"
        );
        report
    }

    fn afflict(
        &self,
        settings: &HazardSettings,
        player: &PlayerSnapshot,
        rng: &mut dyn RandomSource,
        report: &mut TickReport,
    ) {
        self.host.add_effect(player.id, &SLOW);
        self.host.add_effect(player.id, &SLOW_DIGGING);
        report.afflicted = report.afflicted.saturating_add(1);
        debug!(player = %player.name, y = player.location.y, "hypoxia afflicted player");

        let Some(template) = rng
            .pick_index(settings.messages.len())
            .and_then(|index| settings.messages.get(index))
        else {
            return;
        };
        let text = template.replace(PLAYER_TOKEN, &player.name);
        self.host.deliver(player.id, settings.channel, &text);
        report.messages_sent = report.messages_sent.saturating_add(1);
    }

    /// Disconnect hook: drop the player's cache entry.
    pub fn on_player_quit(&self, player: PlayerId) -> bool {
        self.cache.evict(player)
    }

    /// The chance cache, for registering as a placeholder.
    pub fn placeholder(&self) -> Arc<ChanceCache> {
        Arc::clone(&self.cache)
    }

    /// Settings currently in effect.
    pub fn settings(&self) -> &HazardSettings {
        &self.settings
    }

    /// Whether the tick does anything.
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Evaluator chosen by the last reload.
    pub const fn evaluator(&self) -> Evaluator {
        self.evaluator
    }

    /// Whether a sampler task is installed and active.
    pub fn sampler_running(&self) -> bool {
        self.sampler.is_running()
    }

    /// Cancel the sampler. The hazard can be reloaded afterwards.
    pub fn shutdown(&mut self) -> bool {
        self.sampler.cancel()
    }
}

impl<H: Host + ?Sized + 'static> std::fmt::Debug for DepthHypoxia<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthHypoxia")
            .field("settings", &self.settings)
            .field("evaluator", &self.evaluator)
            .field("cached", &self.cache.len())
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}
