//! Chance model: how likely hypoxia is for a player at a given depth and
//! inventory load.
//!
//! The depth factor runs from 0 at the depth ceiling to 1 at `y = 0`; the
//! inventory load is the mean fill ratio over every slot, empty slots
//! counting as 0. Both feed the configured formula as `depth` and
//! `inventory`, and the result is clamped into `[min_chance, max_chance]`.

use hypoxia_types::{ItemStack, PlayerSnapshot};
use tracing::debug;

use crate::formula::{Formula, FormulaError};

/// Expression used when none is configured or the configured one is invalid.
pub const DEFAULT_FORMULA: &str = "depth*inventory";

/// Variable names available to chance formulas, in evaluation order.
pub const VARIABLES: [&str; 2] = ["depth", "inventory"];

/// The expression that turns depth and load into a raw chance.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChanceFormula {
    /// `depth*inventory`, computed directly.
    #[default]
    Default,
    /// A validated custom expression.
    Expression(Formula),
}

impl ChanceFormula {
    /// Parse `source` and check it evaluates to a finite number at the
    /// sentinel point `depth = 1, inventory = 1`.
    ///
    /// # Errors
    ///
    /// Returns the parse or name error from [`Formula::parse`], or
    /// [`FormulaError::NonFinite`] if the sentinel evaluation is not finite.
    pub fn compile(source: &str) -> Result<Self, FormulaError> {
        let formula = Formula::parse(source, &VARIABLES)?;
        let sentinel = formula.evaluate(&[1.0, 1.0])?;
        if !sentinel.is_finite() {
            return Err(FormulaError::NonFinite(sentinel));
        }
        Ok(Self::Expression(formula))
    }

    /// Compile `source`, falling back to [`ChanceFormula::Default`] on any
    /// failure. The error is handed back so the caller can report it.
    pub fn compile_or_default(source: &str) -> (Self, Option<FormulaError>) {
        match Self::compile(source) {
            Ok(formula) => (formula, None),
            Err(err) => (Self::Default, Some(err)),
        }
    }

    /// Evaluate at the given depth factor and inventory load.
    pub fn evaluate(&self, depth: f64, inventory: f64) -> f64 {
        match self {
            Self::Default => depth * inventory,
            Self::Expression(formula) => formula.evaluate(&[depth, inventory]).unwrap_or_else(|err| {
                debug!(error = %err, "chance formula evaluation failed");
                f64::NAN
            }),
        }
    }

    /// The expression text in effect.
    pub fn source(&self) -> &str {
        match self {
            Self::Default => DEFAULT_FORMULA,
            Self::Expression(formula) => formula.source(),
        }
    }
}

/// Mean fill ratio over all inventory slots.
///
/// Empty slots and item types with a zero stack limit contribute 0. An
/// inventory with no slots has load 0.
pub fn inventory_load(slots: &[Option<ItemStack>]) -> f64 {
    if slots.is_empty() {
        return 0.0;
    }
    let filled: f64 = slots
        .iter()
        .flatten()
        .filter(|stack| stack.max_stack_size > 0)
        .map(|stack| f64::from(stack.amount) / f64::from(stack.max_stack_size))
        .sum();
    let count = u32::try_from(slots.len()).unwrap_or(u32::MAX);
    filled / f64::from(count)
}

/// Depth- and load-sensitive chance, bounded by the configured limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChanceModel {
    /// Depth ceiling the depth factor is measured against.
    pub y_max: i32,
    /// Lower bound of the result.
    pub min_chance: f64,
    /// Upper bound of the result.
    pub max_chance: f64,
    /// Expression combining depth factor and load.
    pub formula: ChanceFormula,
}

impl ChanceModel {
    /// `(y_max - y) / y_max`: 0 at the ceiling, 1 at `y = 0`.
    pub fn depth_factor(&self, y: f64) -> f64 {
        let ceiling = f64::from(self.y_max);
        (ceiling - y) / ceiling
    }

    /// Chance for a player at height `y` carrying `load`.
    ///
    /// Callers only ask for players at or below the ceiling. A NaN from the
    /// formula yields `min_chance`.
    pub fn chance(&self, y: f64, load: f64) -> f64 {
        let raw = self.formula.evaluate(self.depth_factor(y), load);
        if raw.is_nan() {
            return self.min_chance;
        }
        raw.min(self.max_chance).max(self.min_chance)
    }

    /// Chance for a player snapshot.
    pub fn chance_for(&self, player: &PlayerSnapshot) -> f64 {
        self.chance(player.location.y, inventory_load(&player.inventory))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use hypoxia_types::{Location, PlayerId};
    use proptest::prelude::*;

    use super::*;

    fn model(formula: ChanceFormula) -> ChanceModel {
        ChanceModel {
            y_max: 42,
            min_chance: 0.1,
            max_chance: 0.9,
            formula,
        }
    }

    #[test]
    fn empty_inventory_has_zero_load() {
        assert_eq!(inventory_load(&[]), 0.0);
        assert_eq!(inventory_load(&[None, None, None]), 0.0);
    }

    #[test]
    fn load_is_mean_over_all_slots() {
        let slots = [
            Some(ItemStack::new(64, 64)),
            Some(ItemStack::new(8, 16)),
            None,
            None,
        ];
        assert_eq!(inventory_load(&slots), 0.375);
    }

    #[test]
    fn zero_stack_limit_contributes_nothing() {
        let slots = [Some(ItemStack::new(3, 0)), Some(ItemStack::new(1, 1))];
        assert_eq!(inventory_load(&slots), 0.5);
    }

    #[test]
    fn depth_factor_endpoints() {
        let model = model(ChanceFormula::Default);
        assert_eq!(model.depth_factor(42.0), 0.0);
        assert_eq!(model.depth_factor(0.0), 1.0);
        assert_eq!(model.depth_factor(21.0), 0.5);
    }

    #[test]
    fn default_formula_at_ceiling_and_floor() {
        let model = model(ChanceFormula::Default);
        // depth factor 0 at the ceiling clamps up to the minimum.
        assert_eq!(model.chance(42.0, 1.0), 0.1);
        // depth factor 1 at y = 0: the chance is the load, within bounds.
        assert_eq!(model.chance(0.0, 0.5), 0.5);
        assert_eq!(model.chance(0.0, 1.0), 0.9);
    }

    #[test]
    fn empty_inventory_at_depth_ten_clamps_to_minimum() {
        let model = model(ChanceFormula::Default);
        let player = PlayerSnapshot {
            id: PlayerId::new(),
            name: "Steve".to_owned(),
            location: Location::new("world", 0.0, 10.0, 0.0),
            inventory: vec![None; 36],
        };
        assert_eq!(model.chance_for(&player), 0.1);
    }

    #[test]
    fn compile_rejects_non_finite_sentinel() {
        let err = ChanceFormula::compile("1 / (depth - 1)").unwrap_err();
        assert!(matches!(err, FormulaError::NonFinite(v) if v.is_infinite()));
    }

    #[test]
    fn compile_or_default_falls_back() {
        let (formula, err) = ChanceFormula::compile_or_default("depth * ");
        assert_eq!(formula, ChanceFormula::Default);
        assert!(matches!(err, Some(FormulaError::Parse { .. })));
        assert_eq!(formula.source(), DEFAULT_FORMULA);

        let (formula, err) = ChanceFormula::compile_or_default("depth ^ 2");
        assert!(err.is_none());
        assert_eq!(formula.source(), "depth ^ 2");
    }

    #[test]
    fn nan_result_yields_minimum() {
        let formula = ChanceFormula::compile("sqrt(depth - 2)").unwrap_err();
        assert!(matches!(formula, FormulaError::NonFinite(_)));
        let model = model(ChanceFormula::compile("sqrt(depth - 0.5)").unwrap());
        // depth factor 0 at the ceiling: sqrt(-0.5) is NaN.
        assert_eq!(model.chance(42.0, 0.0), 0.1);
    }

    proptest! {
        #[test]
        fn chance_stays_within_bounds(depth in 0.0_f64..=42.0, load in 0.0_f64..=1.0) {
            let model = model(ChanceFormula::Default);
            let chance = model.chance(depth, load);
            prop_assert!((0.1..=0.9).contains(&chance));
        }

        #[test]
        fn custom_formula_stays_within_bounds(depth in 0.0_f64..=42.0, load in 0.0_f64..=1.0) {
            let model = model(ChanceFormula::compile("depth * 3 - inventory * 2").unwrap());
            let chance = model.chance(depth, load);
            prop_assert!((0.1..=0.9).contains(&chance));
        }
    }
}
