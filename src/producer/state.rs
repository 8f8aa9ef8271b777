//! Producer's owned-point table and transmission bookkeeping.

use crate::address::{AddressPriorityKey, ModuleIdentifier};
use crate::config;
use crate::point::Point;
use std::collections::{HashMap, HashSet};

/// One point owned by this producer, plus the bookkeeping needed to decide
/// whether it rides the next delta.
pub struct OwnedPoint {
    pub point: Point,
    ticks_since_change: Option<u32>,
    pub has_requested_modules: bool,
}

impl OwnedPoint {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            ticks_since_change: None,
            has_requested_modules: false,
        }
    }

    /// Call after any module add/remove/update on this point.
    pub fn mark_changed(&mut self) {
        self.point.mark_sampled();
        self.ticks_since_change = Some(0);
    }

    /// True for the four ticks following a change (spec.md §4.2: "a point
    /// remains in four consecutive deltas after any change before being
    /// omitted").
    pub fn eligible_for_delta(&self) -> bool {
        matches!(self.ticks_since_change, Some(t) if t < config::CEASE_TRANSMISSION_TICKS)
    }

    /// Called once per non-full tick, after the emit decision for this tick.
    pub fn advance_tick(&mut self) {
        if let Some(t) = self.ticks_since_change {
            self.ticks_since_change = Some(t + 1);
        }
    }

    /// A full point set resends every eligible point and resets its
    /// countdown, as if it had just changed.
    pub fn reset_on_full_set(&mut self) {
        if self.ticks_since_change.is_some() {
            self.ticks_since_change = Some(0);
        }
    }

    /// Emit eligibility per spec.md §4.2: sampled at least once, carries at
    /// least one module, and at least one of its modules is currently
    /// requested by some consumer.
    pub fn is_transmissible(&self, requested: &HashSet<ModuleIdentifier>) -> bool {
        self.point.is_sampled()
            && self.point.module_count() > 0
            && self
                .point
                .module_identifiers()
                .any(|id| requested.contains(&id))
    }
}

/// All mutable state behind the producer's single `RwLock`.
#[derive(Default)]
pub struct ProducerState {
    pub points: HashMap<AddressPriorityKey, OwnedPoint>,
    pub requested_modules: HashSet<ModuleIdentifier>,
    pub full_set_elapsed_us: u64,
    pub system_folio_counters: HashMap<u8, u32>,
    pub module_advertisement_folio: u32,
    pub name_advertisement_folio: u32,
    pub system_advertisement_folio: u32,
}

impl ProducerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every point's `hasRequestedModules` flag against the
    /// current union.
    pub fn recompute_requested_flags(&mut self) {
        for owned in self.points.values_mut() {
            owned.has_requested_modules = owned
                .point
                .module_identifiers()
                .any(|id| self.requested_modules.contains(&id));
        }
    }

    /// Advance and return the per-system folio number, wrapping at `u32::MAX`
    /// (spec.md §4.2: "monotonically incremented (with 32-bit wrap)").
    pub fn next_folio(&mut self, system: u8) -> u32 {
        let counter = self.system_folio_counters.entry(system).or_insert(0);
        let current = *counter;
        *counter = counter.wrapping_add(1);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Priority};
    use crate::cid::Cid;
    use crate::modules::{ModuleValue, Position};

    fn point() -> Point {
        Point::new(Address::new(1, 1, 1).unwrap(), Priority::default(), "n", Cid::new_v4())
    }

    #[test]
    fn eligible_for_delta_only_within_cease_transmission_window() {
        let mut owned = OwnedPoint::new(point());
        assert!(!owned.eligible_for_delta());
        owned.mark_changed();
        for _ in 0..config::CEASE_TRANSMISSION_TICKS {
            assert!(owned.eligible_for_delta());
            owned.advance_tick();
        }
        assert!(!owned.eligible_for_delta());
    }

    #[test]
    fn is_transmissible_requires_sampled_module_and_request() {
        let mut owned = OwnedPoint::new(point());
        let mut requested = HashSet::new();
        assert!(!owned.is_transmissible(&requested));
        owned
            .point
            .add_module(ModuleValue::Position(Position { position: Default::default() }))
            .unwrap();
        owned.mark_changed();
        assert!(!owned.is_transmissible(&requested));
        requested.insert(crate::modules::position::IDENTIFIER);
        assert!(owned.is_transmissible(&requested));
    }

    #[test]
    fn next_folio_wraps_at_u32_max() {
        let mut state = ProducerState::new();
        state.system_folio_counters.insert(1, u32::MAX);
        assert_eq!(state.next_folio(1), u32::MAX);
        assert_eq!(state.next_folio(1), 0);
    }
}
