//! A remote producer as tracked by a consumer.

use super::ip_mode::IpMode;
use super::visibility::Visibility;
use crate::address::{Address, AddressPriorityKey};
use crate::cid::Cid;
use crate::folio::{FolioWindow, SequenceTracker};
use crate::point::Point;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// Per-system folio reassembly state and the producer's last-promoted point
/// table for that system.
pub struct SystemState {
    pub window: FolioWindow,
    pub sequence: SequenceTracker,
    pub points: HashMap<AddressPriorityKey, Point>,
}

impl SystemState {
    fn new(transform_window: u32) -> Self {
        Self {
            window: FolioWindow::new(transform_window),
            sequence: SequenceTracker::new(),
            points: HashMap::new(),
        }
    }

    /// Apply a promoted or best-effort-flushed folio's points: a full point
    /// set replaces the table outright; a delta is unioned in with
    /// last-writer-wins by `(address, priority)`.
    pub fn apply(&mut self, full_point_set: bool, points: Vec<Point>) {
        if full_point_set {
            self.points.clear();
        }
        for point in points {
            self.points.insert(point.key(), point);
        }
    }
}

pub struct ProducerPeer {
    pub cid: Cid,
    pub name: String,
    pub ip_mode: IpMode,
    pub ip_addresses: Vec<IpAddr>,
    pub visibility: Visibility,
    pub sequence_errors: u32,
    pub last_advertisement_us: Option<u64>,
    pub last_transform_us: Option<u64>,
    pub module_advertisement_tracker: SequenceTracker,
    pub name_advertisement_tracker: SequenceTracker,
    pub system_advertisement_tracker: SequenceTracker,
    systems: HashMap<u8, SystemState>,
    point_names: HashMap<Address, String>,
    /// Systems most recently declared by this producer's system-advertisement
    /// response; contributes to `target = { s ∈ observed | some producer
    /// advertises s }` when computing multicast subscription.
    advertised_systems: HashSet<u8>,
}

impl ProducerPeer {
    pub fn new(cid: Cid, ip_mode: IpMode) -> Self {
        Self {
            cid,
            name: String::new(),
            ip_mode,
            ip_addresses: Vec::new(),
            visibility: Visibility::Offline,
            sequence_errors: 0,
            last_advertisement_us: None,
            last_transform_us: None,
            module_advertisement_tracker: SequenceTracker::new(),
            name_advertisement_tracker: SequenceTracker::new(),
            system_advertisement_tracker: SequenceTracker::new(),
            systems: HashMap::new(),
            point_names: HashMap::new(),
            advertised_systems: HashSet::new(),
        }
    }

    pub fn system_mut(&mut self, system: u8, transform_window: u32) -> &mut SystemState {
        self.systems
            .entry(system)
            .or_insert_with(|| SystemState::new(transform_window))
    }

    pub fn systems(&self) -> impl Iterator<Item = (&u8, &SystemState)> {
        self.systems.iter()
    }

    pub fn point_name(&self, address: Address) -> Option<&str> {
        self.point_names.get(&address).map(String::as_str)
    }

    /// Refresh point names from the producer's latest address-point
    /// description table. Called after a folio is promoted into this
    /// peer's authoritative point set.
    pub fn refresh_point_names(&mut self, records: impl IntoIterator<Item = (Address, String)>) {
        for (address, name) in records {
            self.point_names.insert(address, name);
        }
    }

    /// Reset all per-system folio windows and advertisement watermarks on
    /// demotion to `Offline`.
    pub fn reset_on_offline(&mut self) {
        self.systems.clear();
        self.module_advertisement_tracker.reset();
        self.name_advertisement_tracker.reset();
        self.system_advertisement_tracker.reset();
        self.advertised_systems.clear();
    }

    /// Replace the advertised-systems set outright -- used on the first page
    /// of a new system-advertisement response folio.
    pub fn set_advertised_systems(&mut self, systems: impl IntoIterator<Item = u8>) {
        self.advertised_systems = systems.into_iter().collect();
    }

    /// Union additional systems into the set -- used on later pages of the
    /// same response folio, which is still being assembled rather than
    /// starting a fresh snapshot.
    pub fn extend_advertised_systems(&mut self, systems: impl IntoIterator<Item = u8>) {
        self.advertised_systems.extend(systems);
    }

    pub fn advertised_systems(&self) -> impl Iterator<Item = &u8> {
        self.advertised_systems.iter()
    }

    /// Discard the point-name table outright -- used on the first page of a
    /// new name-advertisement response folio, mirroring
    /// `set_advertised_systems`.
    pub fn clear_point_names(&mut self) {
        self.point_names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Priority;

    #[test]
    fn full_point_set_replaces_table() {
        let mut s = SystemState::new(5);
        let a = Point::synthetic(Address::new(1, 1, 1).unwrap(), Priority::default(), "a");
        let b = Point::synthetic(Address::new(1, 1, 2).unwrap(), Priority::default(), "b");
        s.apply(true, vec![a]);
        assert_eq!(s.points.len(), 1);
        s.apply(true, vec![b]);
        assert_eq!(s.points.len(), 1);
    }

    #[test]
    fn delta_unions_with_last_writer_wins() {
        let mut s = SystemState::new(5);
        let addr = Address::new(1, 1, 1).unwrap();
        let a = Point::synthetic(addr, Priority::default(), "first");
        s.apply(true, vec![a]);
        let b = Point::synthetic(addr, Priority::default(), "second");
        s.apply(false, vec![b]);
        assert_eq!(s.points.len(), 1);
        assert_eq!(s.points.get(&AddressPriorityKey { address: addr, priority: Priority::default() }).unwrap().name(), "second");
    }

    #[test]
    fn reset_on_offline_clears_systems_and_trackers() {
        let mut p = ProducerPeer::new(Cid::new_v4(), IpMode::IPv4Only);
        p.system_mut(1, 5).apply(true, vec![]);
        p.module_advertisement_tracker.accept(1, 0, 0);
        p.reset_on_offline();
        assert_eq!(p.systems().count(), 0);
    }

    #[test]
    fn reset_on_offline_clears_advertised_systems() {
        let mut p = ProducerPeer::new(Cid::new_v4(), IpMode::IPv4Only);
        p.set_advertised_systems([1, 5, 20]);
        assert_eq!(p.advertised_systems().count(), 3);
        p.reset_on_offline();
        assert_eq!(p.advertised_systems().count(), 0);
    }
}
