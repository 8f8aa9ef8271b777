//! A remote consumer as tracked by a producer.

use super::ip_mode::IpMode;
use super::visibility::Visibility;
use crate::address::ModuleIdentifier;
use crate::cid::Cid;
use crate::folio::SequenceTracker;
use std::collections::HashMap;
use std::net::IpAddr;

pub struct ConsumerPeer {
    pub cid: Cid,
    pub name: String,
    pub ip_mode: IpMode,
    pub ip_addresses: Vec<IpAddr>,
    pub visibility: Visibility,
    pub sequence_errors: u32,
    /// Timestamp of the most recent advertisement of any kind (module, or a
    /// name/system-advertisement request) -- the 60 s general timeout runs
    /// off this.
    pub last_advertisement_us: Option<u64>,
    /// Timestamp of the most recent module-advertisement specifically -- the
    /// tighter 20 s "active module-advertisement expectation" timeout runs
    /// off this one.
    pub last_module_advertisement_us: Option<u64>,
    pub module_advertisement_tracker: SequenceTracker,
    pub name_advertisement_tracker: SequenceTracker,
    pub system_advertisement_tracker: SequenceTracker,
    declared_modules: HashMap<ModuleIdentifier, u64>,
}

impl ConsumerPeer {
    pub fn new(cid: Cid, ip_mode: IpMode) -> Self {
        Self {
            cid,
            name: String::new(),
            ip_mode,
            ip_addresses: Vec::new(),
            visibility: Visibility::Offline,
            sequence_errors: 0,
            last_advertisement_us: None,
            last_module_advertisement_us: None,
            module_advertisement_tracker: SequenceTracker::new(),
            name_advertisement_tracker: SequenceTracker::new(),
            system_advertisement_tracker: SequenceTracker::new(),
            declared_modules: HashMap::new(),
        }
    }

    /// Refresh the declared-identifier union with current timestamps.
    pub fn refresh_modules(&mut self, identifiers: &[ModuleIdentifier], now_us: u64) {
        for id in identifiers {
            self.declared_modules.insert(*id, now_us);
        }
    }

    /// Purge any identifier unseen for longer than `expiry_us`.
    pub fn purge_expired_modules(&mut self, now_us: u64, expiry_us: u64) {
        self.declared_modules
            .retain(|_, &mut last_seen| now_us.saturating_sub(last_seen) <= expiry_us);
    }

    pub fn declared_modules(&self) -> impl Iterator<Item = ModuleIdentifier> + '_ {
        self.declared_modules.keys().copied()
    }

    pub fn has_requested(&self, identifier: ModuleIdentifier) -> bool {
        self.declared_modules.contains_key(&identifier)
    }

    pub fn reset_on_offline(&mut self) {
        self.module_advertisement_tracker.reset();
        self.name_advertisement_tracker.reset();
        self.system_advertisement_tracker.reset();
        self.declared_modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_removes_only_stale_identifiers() {
        let mut c = ConsumerPeer::new(Cid::new_v4(), IpMode::IPv4Only);
        let fresh = ModuleIdentifier::new(0, 1);
        let stale = ModuleIdentifier::new(0, 3);
        c.refresh_modules(&[fresh], 100);
        c.refresh_modules(&[stale], 0);
        c.purge_expired_modules(100, 30);
        assert!(c.has_requested(fresh));
        assert!(!c.has_requested(stale));
    }
}
