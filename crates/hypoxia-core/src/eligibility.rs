//! Eligibility gate: is a player somewhere hypoxia can happen?
//!
//! Checks run cheapest and most discriminating first: cave, then depth,
//! then region permission. The first two form the hazard zone; the region
//! check is kept separate so the evaluator can run it last, after the
//! random gates have already thinned out most players.

use hypoxia_types::{CheckType, Location};

use crate::host::{Regions, Terrain};

/// Spatial and permission predicates for one reload's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityGate {
    /// Players above this Y are never eligible.
    pub y_max: i32,
}

impl EligibilityGate {
    /// Create a gate with the given depth ceiling.
    pub const fn new(y_max: i32) -> Self {
        Self { y_max }
    }

    /// Inside a cave and at or below the depth ceiling.
    pub fn in_hazard_zone<H: Terrain + ?Sized>(self, host: &H, location: &Location) -> bool {
        host.is_cave(location) && location.y <= f64::from(self.y_max)
    }

    /// Region protection allows applying effects here.
    pub fn permits<H: Regions + ?Sized>(self, host: &H, location: &Location) -> bool {
        host.check(CheckType::Effect, location)
    }

    /// All three checks, short-circuiting in order.
    pub fn eligible<H: Terrain + Regions + ?Sized>(self, host: &H, location: &Location) -> bool {
        self.in_hazard_zone(host, location) && self.permits(host, location)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Counts how often each predicate is consulted.
    struct FakeWorld {
        cave: bool,
        allowed: bool,
        cave_calls: Cell<u32>,
        region_calls: Cell<u32>,
    }

    impl FakeWorld {
        fn new(cave: bool, allowed: bool) -> Self {
            Self {
                cave,
                allowed,
                cave_calls: Cell::new(0),
                region_calls: Cell::new(0),
            }
        }
    }

    impl Terrain for FakeWorld {
        fn is_cave(&self, _location: &Location) -> bool {
            self.cave_calls.set(self.cave_calls.get().saturating_add(1));
            self.cave
        }
    }

    impl Regions for FakeWorld {
        fn check(&self, check: CheckType, _location: &Location) -> bool {
            assert_eq!(check, CheckType::Effect);
            self.region_calls.set(self.region_calls.get().saturating_add(1));
            self.allowed
        }
    }

    fn at(y: f64) -> Location {
        Location::new("world", 0.0, y, 0.0)
    }

    #[test]
    fn eligible_when_all_checks_pass() {
        let world = FakeWorld::new(true, true);
        let gate = EligibilityGate::new(42);
        assert!(gate.eligible(&world, &at(42.0)));
        assert!(gate.eligible(&world, &at(-30.0)));
    }

    #[test]
    fn above_ceiling_is_never_eligible() {
        let world = FakeWorld::new(true, true);
        let gate = EligibilityGate::new(42);
        assert!(!gate.eligible(&world, &at(42.5)));
        assert!(!gate.in_hazard_zone(&world, &at(100.0)));
        assert_eq!(world.region_calls.get(), 0);
    }

    #[test]
    fn outside_cave_skips_remaining_checks() {
        let world = FakeWorld::new(false, true);
        let gate = EligibilityGate::new(42);
        assert!(!gate.eligible(&world, &at(10.0)));
        assert_eq!(world.cave_calls.get(), 1);
        assert_eq!(world.region_calls.get(), 0);
    }

    #[test]
    fn protected_region_blocks() {
        let world = FakeWorld::new(true, false);
        let gate = EligibilityGate::new(42);
        assert!(gate.in_hazard_zone(&world, &at(10.0)));
        assert!(!gate.eligible(&world, &at(10.0)));
    }
}
