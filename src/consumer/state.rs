//! Consumer's declared-interest set and subscription/merge bookkeeping.

use crate::address::ModuleIdentifier;
use std::collections::HashSet;

/// All mutable state behind the consumer's single `RwLock`,
/// mirroring [`crate::producer::state::ProducerState`]'s role on the
/// producer side.
#[derive(Default)]
pub struct ConsumerState {
    /// Module identifiers this consumer declares via module-advertisement
    /// (`moduleTypes`; mutable post-construction via
    /// `addModuleTypes`/`removeModuleTypes`).
    pub module_types: HashSet<ModuleIdentifier>,
    /// System numbers this consumer cares about (`observedSystems`;
    /// mutable via `observeSystemNumbers`).
    pub observed_systems: HashSet<u8>,
    /// Transform multicast groups currently joined, keyed by system number.
    pub joined_systems: HashSet<u8>,
    pub module_advertisement_folio: u32,
    pub system_advertisement_folio: u32,
    pub name_advertisement_folio: u32,
}

impl ConsumerState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_has_no_declared_interest() {
        let s = ConsumerState::new();
        assert!(s.module_types.is_empty());
        assert!(s.observed_systems.is_empty());
        assert!(s.joined_systems.is_empty());
    }
}
