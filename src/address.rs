//! OTP address, priority, and module identifier types.

use crate::config;
use crate::error::ValidationError;
use std::cmp::Ordering;
use std::fmt;

/// `(systemNumber, groupNumber, pointNumber)` triple identifying a point.
///
/// Total order is lexicographic by the triple, derived directly since field
/// declaration order already matches the required precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub system: u32,
    pub group: u32,
    pub point: u32,
}

impl Address {
    /// Validate and construct an address.
    pub fn new(system: u32, group: u32, point: u32) -> Result<Self, ValidationError> {
        if !(config::SYSTEM_NUMBER_MIN..=config::SYSTEM_NUMBER_MAX).contains(&system) {
            return Err(ValidationError::InvalidSystem(system));
        }
        if !(config::GROUP_NUMBER_MIN..=config::GROUP_NUMBER_MAX).contains(&group) {
            return Err(ValidationError::InvalidGroup(group));
        }
        if !(config::POINT_NUMBER_MIN..=config::POINT_NUMBER_MAX).contains(&point) {
            return Err(ValidationError::InvalidPoint(point));
        }
        Ok(Self {
            system,
            group,
            point,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.system, self.group, self.point)
    }
}

/// Priority in `[0, 200]`; higher numerically means higher precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const DEFAULT: Priority = Priority(config::PRIORITY_DEFAULT);

    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if value > config::PRIORITY_MAX as u32 {
            return Err(ValidationError::InvalidPriority(value));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(manufacturerID, moduleNumber)` pair, ordered lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleIdentifier {
    pub manufacturer_id: u16,
    pub module_number: u16,
}

impl ModuleIdentifier {
    pub const fn new(manufacturer_id: u16, module_number: u16) -> Self {
        Self {
            manufacturer_id,
            module_number,
        }
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}/{:#06x}", self.manufacturer_id, self.module_number)
    }
}

/// `(address, priority)` key used to disambiguate multiple producers of the
/// same point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressPriorityKey {
    pub address: Address,
    pub priority: Priority,
}

impl PartialOrd for AddressPriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AddressPriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address
            .cmp(&other.address)
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_rejects_out_of_range_system() {
        assert_eq!(
            Address::new(0, 1, 1),
            Err(ValidationError::InvalidSystem(0))
        );
        assert_eq!(
            Address::new(201, 1, 1),
            Err(ValidationError::InvalidSystem(201))
        );
    }

    #[test]
    fn address_rejects_out_of_range_group() {
        assert_eq!(Address::new(1, 0, 1), Err(ValidationError::InvalidGroup(0)));
        assert_eq!(
            Address::new(1, 60_001, 1),
            Err(ValidationError::InvalidGroup(60_001))
        );
    }

    #[test]
    fn address_rejects_out_of_range_point() {
        assert_eq!(Address::new(1, 1, 0), Err(ValidationError::InvalidPoint(0)));
        assert_eq!(
            Address::new(1, 1, 4_000_000_001),
            Err(ValidationError::InvalidPoint(4_000_000_001))
        );
    }

    #[test]
    fn address_total_order_is_lexicographic() {
        let a = Address::new(1, 1, 1).unwrap();
        let b = Address::new(1, 1, 2).unwrap();
        let c = Address::new(1, 2, 1).unwrap();
        let d = Address::new(2, 1, 1).unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
    }

    #[test]
    fn priority_rejects_above_max() {
        assert_eq!(Priority::new(201), Err(ValidationError::InvalidPriority(201)));
        assert!(Priority::new(200).is_ok());
    }

    #[test]
    fn priority_default_is_100() {
        assert_eq!(Priority::default().value(), 100);
    }

    #[test]
    fn module_identifier_orders_lexicographically() {
        let a = ModuleIdentifier::new(1, 5);
        let b = ModuleIdentifier::new(1, 6);
        let c = ModuleIdentifier::new(2, 0);
        assert!(a < b);
        assert!(b < c);
    }
}
