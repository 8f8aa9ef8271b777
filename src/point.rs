//! Point: address + priority + name + unordered module set.

use crate::address::{Address, AddressPriorityKey, ModuleIdentifier, Priority};
use crate::cid::Cid;
use crate::codec::cursor::truncate_to_utf8_boundary;
use crate::config;
use crate::error::ValidationError;
use crate::modules::{self, ModuleValue};
use std::collections::BTreeMap;

/// The addressable unit of transform.
///
/// `cid`/`sampled` are `Some` for a point owned by a producer and `None`
/// for the synthetic point a consumer's merge cycle emits when averaging
/// equal-priority contributors.
#[derive(Debug, Clone)]
pub struct Point {
    pub address: Address,
    pub priority: Priority,
    name: String,
    modules: BTreeMap<ModuleIdentifier, ModuleValue>,
    pub cid: Option<Cid>,
    pub sampled: Option<bool>,
}

impl Point {
    /// Construct an owned point. `name` is truncated to a valid UTF-8
    /// boundary within 32 bytes; the encoded wire form is
    /// additionally NUL-padded by the codec.
    pub fn new(address: Address, priority: Priority, name: &str, cid: Cid) -> Self {
        Self {
            address,
            priority,
            name: truncate_to_utf8_boundary(name, config::NAME_LENGTH).to_string(),
            modules: BTreeMap::new(),
            cid: Some(cid),
            sampled: Some(false),
        }
    }

    /// Construct a synthetic (merged) point with no owning producer.
    pub fn synthetic(address: Address, priority: Priority, name: &str) -> Self {
        Self {
            address,
            priority,
            name: truncate_to_utf8_boundary(name, config::NAME_LENGTH).to_string(),
            modules: BTreeMap::new(),
            cid: None,
            sampled: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: &str) {
        self.name = truncate_to_utf8_boundary(name, config::NAME_LENGTH).to_string();
    }

    pub fn key(&self) -> AddressPriorityKey {
        AddressPriorityKey {
            address: self.address,
            priority: self.priority,
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleValue> {
        self.modules.values()
    }

    pub fn module_identifiers(&self) -> impl Iterator<Item = ModuleIdentifier> + '_ {
        self.modules.keys().copied()
    }

    pub fn module(&self, identifier: ModuleIdentifier) -> Option<&ModuleValue> {
        self.modules.get(&identifier)
    }

    pub fn has_module(&self, identifier: ModuleIdentifier) -> bool {
        self.modules.contains_key(&identifier)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Reject a duplicate identifier on this point.
    pub fn add_module(&mut self, value: ModuleValue) -> Result<(), ValidationError> {
        let id = value.identifier();
        if self.modules.contains_key(&id) {
            return Err(ValidationError::ModuleExists);
        }
        self.modules.insert(id, value);
        Ok(())
    }

    /// Overwrite an existing module's value (used by the transform-receive
    /// path and by `updateModule`); does not participate in the duplicate
    /// check `add_module` performs.
    pub fn set_module(&mut self, value: ModuleValue) {
        self.modules.insert(value.identifier(), value);
    }

    /// Fails with `DependentModuleExists` if a module that depends on
    /// `identifier` is still present.
    pub fn remove_module(&mut self, identifier: ModuleIdentifier) -> Result<(), ValidationError> {
        if modules::dependents_of(identifier).any(|dep| self.modules.contains_key(&dep)) {
            return Err(ValidationError::DependentModuleExists);
        }
        self.modules.remove(&identifier);
        Ok(())
    }

    /// Adding a "source" module implicitly adds default-initialized
    /// instances of its associates (dependents) if absent.
    /// Call after `add_module` succeeds for the source identifier.
    pub fn add_implicit_associates(&mut self, source: ModuleIdentifier) {
        for dependent in modules::dependents_of(source) {
            if !self.modules.contains_key(&dependent) {
                if let Some(default) = ModuleValue::default_for(dependent) {
                    self.modules.insert(dependent, default);
                }
            }
        }
    }

    /// A point is sampled when any of its modules were last updated;
    /// unsampled points are not transmitted.
    pub fn is_sampled(&self) -> bool {
        self.sampled.unwrap_or(false)
    }

    pub fn mark_sampled(&mut self) {
        if self.cid.is_some() {
            self.sampled = Some(true);
        }
    }

    /// Merge a same-address, same-priority-tier group of contributing
    /// points into one synthetic point. Returns `None` if
    /// any module's merge signals `excludePoint`.
    pub fn merge(contributors: &[&Point]) -> Option<Point> {
        let first = contributors.first()?;
        let mut merged = Point::synthetic(first.address, first.priority, &first.name);

        if contributors.len() == 1 {
            for m in first.modules.values() {
                merged.modules.insert(m.identifier(), m.clone());
            }
            return Some(merged);
        }

        let mut identifiers: Vec<ModuleIdentifier> = contributors
            .iter()
            .flat_map(|p| p.module_identifiers())
            .collect();
        identifiers.sort();
        identifiers.dedup();

        for id in identifiers {
            let values: Vec<&ModuleValue> =
                contributors.iter().filter_map(|p| p.module(id)).collect();
            let (value, excluded) = ModuleValue::merge(&values);
            if excluded {
                return None;
            }
            if let Some(v) = value {
                merged.modules.insert(id, v);
            }
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Position;

    fn addr() -> Address {
        Address::new(1, 1, 1).unwrap()
    }

    #[test]
    fn name_is_truncated_to_32_bytes_on_boundary() {
        let long = "a".repeat(40);
        let p = Point::new(addr(), Priority::default(), &long, Cid::new_v4());
        assert!(p.name().len() <= 32);
        assert!(long.starts_with(p.name()));
    }

    #[test]
    fn add_module_rejects_duplicate_identifier() {
        let mut p = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        p.add_module(ModuleValue::Position(Position {
            position: Default::default(),
        }))
        .unwrap();
        let err = p.add_module(ModuleValue::Position(Position {
            position: Default::default(),
        }));
        assert_eq!(err, Err(ValidationError::ModuleExists));
    }

    #[test]
    fn remove_module_blocked_by_dependent() {
        let mut p = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        p.add_module(ModuleValue::Position(Position { position: Default::default() }))
            .unwrap();
        p.add_implicit_associates(crate::modules::position::IDENTIFIER);
        assert!(p.has_module(crate::modules::velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER));
        let err = p.remove_module(crate::modules::position::IDENTIFIER);
        assert_eq!(err, Err(ValidationError::DependentModuleExists));
    }

    #[test]
    fn remove_module_succeeds_after_dependent_removed() {
        let mut p = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        p.add_module(ModuleValue::Position(Position { position: Default::default() }))
            .unwrap();
        p.add_implicit_associates(crate::modules::position::IDENTIFIER);
        p.remove_module(crate::modules::velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER)
            .unwrap();
        p.remove_module(crate::modules::position::IDENTIFIER).unwrap();
        assert!(!p.has_module(crate::modules::position::IDENTIFIER));
    }

    #[test]
    fn merge_single_contributor_passes_through() {
        let mut p = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        p.add_module(ModuleValue::Position(Position { position: Default::default() }))
            .unwrap();
        let merged = Point::merge(&[&p]).unwrap();
        assert!(merged.cid.is_none());
        assert!(merged.sampled.is_none());
        assert_eq!(merged.module_count(), 1);
    }

    #[test]
    fn merge_unions_module_identifiers_when_no_exclusion() {
        let mut a = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        a.add_module(ModuleValue::Position(Position { position: Default::default() }))
            .unwrap();
        let mut b = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        b.add_module(ModuleValue::Scale(crate::modules::Scale { scale: Default::default() }))
            .unwrap();
        let merged = Point::merge(&[&a, &b]).unwrap();
        assert!(merged.has_module(crate::modules::position::IDENTIFIER));
        assert!(merged.has_module(crate::modules::scale::IDENTIFIER));
    }

    #[test]
    fn merge_excludes_point_on_parent_disagreement() {
        let mut a = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        a.add_module(ModuleValue::Parent(crate::modules::Parent {
            parent: Address::new(1, 1, 2).unwrap(),
            relative: true,
        }))
        .unwrap();
        let mut b = Point::new(addr(), Priority::default(), "n", Cid::new_v4());
        b.add_module(ModuleValue::Parent(crate::modules::Parent {
            parent: Address::new(1, 1, 3).unwrap(),
            relative: true,
        }))
        .unwrap();
        assert!(Point::merge(&[&a, &b]).is_none());
    }
}
