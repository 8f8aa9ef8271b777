//! Producer engine: owns a set of points, schedules transform and
//! advertisement traffic, and tracks discovered consumers.

pub mod state;
pub mod transmit;

use crate::address::{Address, AddressPriorityKey, ModuleIdentifier, Priority};
use crate::cid::Cid;
use crate::codec::advertisement::{
    AddressPointDescription, AdvertisementLayer, ModuleAdvertisement, NameAdvertisement,
    SystemAdvertisement,
};
use crate::codec::cursor::Writer;
use crate::codec::otp_layer::{OtpBody, OtpLayer};
use crate::config;
use crate::error::{SocketError, StartError, ValidationError};
use crate::event::{ErrorEvent, PeerStatus, ProducerDelegate, ProducerEvent};
use crate::modules::ModuleValue;
use crate::peer::{ConsumerPeer, IpMode, Visibility};
use crate::point::Point;
use crate::transport::{AddressResolver, Scheduler, Socket, TimerHandle};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use state::{OwnedPoint, ProducerState};

/// Already-bound, already-joined socket handles the host hands to a
/// producer at construction (spec.md §1, §6.1: bind/join/leave are a host
/// concern; the engine only ever calls `send_to`). A family's pair of
/// handles is `None` when that family is disabled by `ip_mode`.
#[derive(Default)]
pub struct ProducerSockets {
    pub advertisement_v4: Option<Arc<dyn Socket>>,
    pub advertisement_v6: Option<Arc<dyn Socket>>,
    pub transform_v4: Option<Arc<dyn Socket>>,
    pub transform_v6: Option<Arc<dyn Socket>>,
}

impl ProducerSockets {
    fn advertisement_socket(&self, ipv6: bool) -> Option<&Arc<dyn Socket>> {
        if ipv6 {
            self.advertisement_v6.as_ref()
        } else {
            self.advertisement_v4.as_ref()
        }
    }
}

/// An OTP Producer: owns a table of addressable points, emits transform and
/// advertisement traffic on a timer cascade, and tracks the consumers that
/// have advertised interest in it.
pub struct Producer {
    cid: Cid,
    name: RwLock<String>,
    config: crate::config::ProducerConfig,
    sockets: ProducerSockets,
    scheduler: Arc<dyn Scheduler>,
    resolver: Arc<dyn AddressResolver>,
    delegate: Arc<dyn ProducerDelegate>,
    state: RwLock<ProducerState>,
    consumers: DashMap<Cid, Arc<Mutex<ConsumerPeer>>>,
    cached_name_response: ArcSwap<Vec<Vec<u8>>>,
    cached_system_response: ArcSwap<Vec<Vec<u8>>>,
    timers: Mutex<Vec<TimerHandle>>,
    started: AtomicBool,
}

impl Producer {
    pub fn new(
        config: crate::config::ProducerConfig,
        sockets: ProducerSockets,
        scheduler: Arc<dyn Scheduler>,
        resolver: Arc<dyn AddressResolver>,
        delegate: Arc<dyn ProducerDelegate>,
    ) -> Arc<Self> {
        let cid = config.cid;
        let name = RwLock::new(config.name.clone());
        Arc::new(Self {
            cid,
            name,
            config,
            sockets,
            scheduler,
            resolver,
            delegate,
            state: RwLock::new(ProducerState::new()),
            consumers: DashMap::new(),
            cached_name_response: ArcSwap::from_pointee(Vec::new()),
            cached_system_response: ArcSwap::from_pointee(Vec::new()),
            timers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    fn name(&self) -> String {
        self.name.read().clone()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Validate sockets are present for every family `ip_mode` enables,
    /// rebuild cached advertisement responses, and arm timers (spec.md
    /// §4.2 "On start"). Requires `Arc<Self>` since timer closures must
    /// outlive the call.
    pub fn start(self: &Arc<Self>) -> Result<(), StartError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StartError::AlreadyStarted);
        }
        self.validate_sockets()?;
        self.rebuild_caches();

        let me = Arc::clone(self);
        let initial_wait_handle = self.scheduler.after(
            config::INITIAL_WAIT,
            Box::new(move || me.arm_periodic_timers()),
        );
        self.timers.lock().push(initial_wait_handle);
        Ok(())
    }

    fn validate_sockets(&self) -> Result<(), StartError> {
        let needs_v4 = matches!(self.config.ip_mode, IpMode::IPv4Only | IpMode::IPv4And6);
        let needs_v6 = matches!(self.config.ip_mode, IpMode::IPv6Only | IpMode::IPv4And6);
        if needs_v4 && (self.sockets.advertisement_v4.is_none() || self.sockets.transform_v4.is_none()) {
            return Err(SocketError::CouldNotBind("ipv4 socket not provided".into()).into());
        }
        if needs_v6 && (self.sockets.advertisement_v6.is_none() || self.sockets.transform_v6.is_none()) {
            return Err(SocketError::CouldNotBind("ipv6 socket not provided".into()).into());
        }
        Ok(())
    }

    /// Arms the transform timer, the 10 s module-advertisement housekeeping
    /// timer, and the 1 s data-loss scan -- fired once the 12 s initial
    /// wait elapses.
    fn arm_periodic_timers(self: &Arc<Self>) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let mut handles = Vec::new();

        let transform = Arc::clone(self);
        handles.push(self.scheduler.every(
            self.config.interval,
            Box::new(move || transform.tick_transform()),
        ));

        let housekeeping = Arc::clone(self);
        handles.push(self.scheduler.every(
            config::MODULE_ADVERTISEMENT_PERIOD,
            Box::new(move || housekeeping.module_advertisement_housekeeping()),
        ));

        let loss = Arc::clone(self);
        handles.push(self.scheduler.every(
            config::DATA_LOSS_SCAN_PERIOD,
            Box::new(move || loss.scan_data_loss()),
        ));

        self.timers.lock().extend(handles);
    }

    /// Cancels every timer; sockets are the host's to close (spec.md §5
    /// "stop() cancels every timer ... then closes sockets").
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        let mut handles = self.timers.lock();
        for handle in handles.drain(..) {
            self.scheduler.cancel(handle);
        }
    }

    // ------------------------------------------------------------------
    // Public point/module mutation API
    // ------------------------------------------------------------------

    pub fn update_name(&self, name: &str) {
        *self.name.write() = crate::codec::cursor::truncate_to_utf8_boundary(name, config::NAME_LENGTH)
            .to_string();
    }

    /// Rejects an exact `(address, priority)` duplicate with `Exists`; when
    /// `name` is non-empty, every point already at `address` (any priority)
    /// is renamed to match, preserving the "names must be identical across
    /// priorities at one address" invariant.
    pub fn add_point(&self, address: Address, priority: Priority, name: &str) -> Result<(), ValidationError> {
        let key = AddressPriorityKey { address, priority };
        let mut state = self.state.write();
        if state.points.contains_key(&key) {
            return Err(ValidationError::Exists);
        }
        let effective_name = if name.is_empty() {
            state
                .points
                .values()
                .find(|p| p.point.address == address)
                .map(|p| p.point.name().to_string())
                .unwrap_or_default()
        } else {
            for owned in state.points.values_mut() {
                if owned.point.address == address {
                    owned.point.rename(name);
                }
            }
            name.to_string()
        };
        state
            .points
            .insert(key, OwnedPoint::new(Point::new(address, priority, &effective_name, self.cid)));
        drop(state);
        self.rebuild_caches();
        Ok(())
    }

    pub fn remove_points(&self, addresses: &[Address]) {
        let mut state = self.state.write();
        state.points.retain(|key, _| !addresses.contains(&key.address));
        drop(state);
        self.rebuild_caches();
    }

    pub fn rename_points(&self, address: Address, name: &str) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        let mut found = false;
        for owned in state.points.values_mut() {
            if owned.point.address == address {
                owned.point.rename(name);
                found = true;
            }
        }
        if !found {
            return Err(ValidationError::NotFound);
        }
        drop(state);
        self.rebuild_caches();
        Ok(())
    }

    /// Adding a "source" module implicitly adds default-initialized
    /// instances of its associates if absent.
    pub fn add_module(
        &self,
        address: Address,
        priority: Priority,
        value: ModuleValue,
    ) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        let key = AddressPriorityKey { address, priority };
        let owned = state.points.get_mut(&key).ok_or(ValidationError::NotFound)?;
        let identifier = value.identifier();
        owned.point.add_module(value)?;
        owned.point.add_implicit_associates(identifier);
        owned.mark_changed();
        Ok(())
    }

    /// Fails with `DependentModuleExists` if a module that depends on
    /// `identifier` is still present.
    pub fn remove_module(
        &self,
        address: Address,
        priority: Priority,
        identifier: ModuleIdentifier,
    ) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        let key = AddressPriorityKey { address, priority };
        let owned = state.points.get_mut(&key).ok_or(ValidationError::NotFound)?;
        owned.point.remove_module(identifier)?;
        owned.mark_changed();
        Ok(())
    }

    /// Overwrites an existing module's sampled value. Does not perform the
    /// duplicate-identifier check `add_module` does.
    pub fn update_module(
        &self,
        address: Address,
        priority: Priority,
        value: ModuleValue,
    ) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        let key = AddressPriorityKey { address, priority };
        let owned = state.points.get_mut(&key).ok_or(ValidationError::NotFound)?;
        owned.point.set_module(value);
        owned.mark_changed();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Receive path (host calls this once it has read a datagram and
    // identified it as coming in on an advertisement socket; spec.md §5
    // "asynchronous socket callbacks")
    // ------------------------------------------------------------------

    pub fn receive(self: &Arc<Self>, data: &[u8], from: SocketAddr, is_ipv6: bool) {
        let mut reader = crate::codec::cursor::Reader::new(data);
        let decoded = match OtpLayer::decode(&mut reader) {
            Ok(Some(d)) => d,
            Ok(None) => return, // bad packet identifier: dropped silently
            Err(e) => {
                self.delegate.on_error(ErrorEvent::LayerError(e.to_string()));
                return;
            }
        };
        let (layer, body_errors) = decoded;
        for err in body_errors {
            self.delegate.on_error(ErrorEvent::LayerError(err.to_string()));
        }
        if layer.source_cid == self.cid {
            return; // ignore our own traffic looped back
        }

        let OtpBody::Advertisement(advertisement) = layer.body else {
            return; // producers never receive transform traffic
        };

        let now_us = self.scheduler.now_micros();
        // Clone the per-peer Arc out of the shard guard and drop the guard
        // immediately: the match arms below call back into methods that
        // iterate `self.consumers`, which would deadlock against a shard
        // still held open here.
        let peer_handle = Arc::clone(&self.consumers.entry(layer.source_cid).or_insert_with(|| {
            Arc::new(Mutex::new(ConsumerPeer::new(
                layer.source_cid,
                if is_ipv6 { IpMode::IPv6Only } else { IpMode::IPv4Only },
            )))
        }));
        let mut peer = peer_handle.lock();

        let was_offline = peer.visibility == Visibility::Offline;
        let admission = crate::peer::ip_mode::evaluate(&mut peer.ip_mode, is_ipv6, was_offline);
        crate::peer::ip_mode::record_address(&mut peer.ip_addresses, from.ip());
        if admission == crate::peer::ip_mode::Admission::RecordOnly {
            return;
        }
        peer.name = layer.component_name.clone();

        match advertisement {
            AdvertisementLayer::Module(m) => {
                let acceptance = peer.module_advertisement_tracker.accept(
                    layer.folio_number,
                    layer.page,
                    config::ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW,
                );
                if !self.handle_sequence_acceptance(&mut peer, acceptance, now_us) {
                    return;
                }
                peer.last_module_advertisement_us = Some(now_us);
                peer.refresh_modules(&m.module_identifiers, now_us);
                drop(peer);
                self.refresh_requested_modules();
            }
            AdvertisementLayer::Name(n) if !n.is_response => {
                let acceptance = peer.name_advertisement_tracker.accept(
                    layer.folio_number,
                    layer.page,
                    config::ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW,
                );
                if !self.handle_sequence_acceptance(&mut peer, acceptance, now_us) {
                    return;
                }
                drop(peer);
                self.schedule_reply(from, is_ipv6, self.cached_name_response.load_full());
            }
            AdvertisementLayer::System(s) if !s.is_response => {
                let acceptance = peer.system_advertisement_tracker.accept(
                    layer.folio_number,
                    layer.page,
                    config::ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW,
                );
                if !self.handle_sequence_acceptance(&mut peer, acceptance, now_us) {
                    return;
                }
                drop(peer);
                self.schedule_reply(from, is_ipv6, self.cached_system_response.load_full());
            }
            _ => {
                // responses addressed to other producers; nothing to do.
            }
        }
    }

    /// Returns `false` if the folio was rejected by the sequence window (the
    /// caller should stop processing this datagram); promotes the peer to
    /// `Advertising` and updates its general advertisement timestamp on
    /// acceptance.
    fn handle_sequence_acceptance(
        &self,
        peer: &mut ConsumerPeer,
        acceptance: crate::folio::Acceptance,
        now_us: u64,
    ) -> bool {
        use crate::folio::Acceptance;
        match acceptance {
            Acceptance::OutOfWindow => {
                peer.sequence_errors += 1;
                self.delegate.on_error(ErrorEvent::SequenceError(format!(
                    "folio out of window for consumer {}",
                    peer.cid
                )));
                self.notify_status(peer);
                false
            }
            Acceptance::DuplicatePage => false,
            Acceptance::FirstMessage | Acceptance::NewFolio | Acceptance::SameFolioNewPage => {
                peer.last_advertisement_us = Some(now_us);
                if peer.visibility == Visibility::Offline {
                    peer.visibility = Visibility::Advertising;
                }
                self.notify_status(peer);
                true
            }
        }
    }

    fn notify_status(&self, peer: &ConsumerPeer) {
        self.delegate.on_event(ProducerEvent::ConsumerStatusChanged(PeerStatus {
            cid: peer.cid,
            name: peer.name.clone(),
            ip_mode: peer.ip_mode,
            ip_addresses: peer.ip_addresses.clone(),
            sequence_errors: peer.sequence_errors,
            state: peer.visibility,
            declared_modules: peer.declared_modules().collect(),
        }));
    }

    /// Schedule a single unicast reply after a uniform-random backoff in
    /// `[0, 5000] ms` to avoid synchronized responses.
    fn schedule_reply(self: &Arc<Self>, dest: SocketAddr, is_ipv6: bool, pages: Arc<Vec<Vec<u8>>>) {
        use rand::Rng;
        let max_ms = config::ADVERTISEMENT_REPLY_BACKOFF_MAX.as_millis() as u64;
        let delay_ms = rand::thread_rng().gen_range(0..=max_ms);
        let me = Arc::clone(self);
        let handle = self.scheduler.after(
            std::time::Duration::from_millis(delay_ms),
            Box::new(move || {
                if let Some(socket) = me.sockets.advertisement_socket(is_ipv6) {
                    for page in pages.iter() {
                        let _ = socket.send_to(page, dest);
                    }
                }
            }),
        );
        self.timers.lock().push(handle);
    }

    // ------------------------------------------------------------------
    // Timer bodies
    // ------------------------------------------------------------------

    fn tick_transform(self: &Arc<Self>) {
        let now_us = self.scheduler.now_micros();
        let tick_interval_us = self.config.interval.as_micros() as u64;
        let (full_point_set, by_system) = {
            let mut state = self.state.write();
            transmit::plan_tick(&mut state, tick_interval_us)
        };
        let name = self.name();
        for (system, points) in by_system {
            if points.is_empty() {
                continue;
            }
            let folio_number = self.state.write().next_folio(system);
            let datagrams = transmit::pack_transform_datagrams(
                self.cid,
                &name,
                system,
                now_us,
                full_point_set,
                folio_number,
                &points,
                config::DEFAULT_MAX_DATAGRAM_SIZE,
            );
            for dg in &datagrams {
                if let Some(socket) = &self.sockets.transform_v4 {
                    let dest = self.resolver.transform_group(system, false);
                    let _ = socket.send_to(dg, dest);
                }
                if let Some(socket) = &self.sockets.transform_v6 {
                    let dest = self.resolver.transform_group(system, true);
                    let _ = socket.send_to(dg, dest);
                }
            }
        }
    }

    /// Purge stale declared-module entries, refresh the requested-module
    /// union, and recompute every point's `hasRequestedModules` flag.
    fn module_advertisement_housekeeping(&self) {
        let now_us = self.scheduler.now_micros();
        let expiry_us = config::MODULE_ADVERTISEMENT_EXPIRY.as_micros() as u64;
        for entry in self.consumers.iter() {
            entry.value().lock().purge_expired_modules(now_us, expiry_us);
        }
        self.refresh_requested_modules();
    }

    fn refresh_requested_modules(&self) {
        let mut union: HashSet<ModuleIdentifier> = HashSet::new();
        for entry in self.consumers.iter() {
            let peer = entry.value().lock();
            if peer.visibility != Visibility::Offline {
                union.extend(peer.declared_modules());
            }
        }
        let mut state = self.state.write();
        state.requested_modules = union;
        state.recompute_requested_flags();
    }

    /// Once per second: demote a consumer peer whose general advertisement
    /// silence exceeds 60 s, or whose module-advertisement silence exceeds
    /// the tighter 20 s "active expectation" window.
    fn scan_data_loss(&self) {
        let now_us = self.scheduler.now_micros();
        let advertising_timeout_us = config::ADVERTISING_TIMEOUT.as_micros() as u64;
        let module_timeout_us = config::MODULE_ADVERTISEMENT_TIMEOUT.as_micros() as u64;
        for entry in self.consumers.iter() {
            let mut peer = entry.value().lock();
            if peer.visibility == Visibility::Offline {
                continue;
            }
            let general_elapsed = now_us.saturating_sub(peer.last_advertisement_us.unwrap_or(0));
            let module_stale = peer
                .last_module_advertisement_us
                .is_some_and(|t| now_us.saturating_sub(t) > module_timeout_us);
            if general_elapsed > advertising_timeout_us || module_stale {
                peer.visibility = Visibility::Offline;
                peer.reset_on_offline();
                self.notify_status(&peer);
            }
        }
    }

    // ------------------------------------------------------------------
    // Cached advertisement response datagrams (spec.md §4.2 item 2: "for
    // efficient timer-path reuse")
    // ------------------------------------------------------------------

    fn rebuild_caches(&self) {
        let state = self.state.read();
        let mut systems: Vec<u8> = state.points.keys().map(|k| k.address.system as u8).collect();
        systems.sort_unstable();
        systems.dedup();

        let mut names: BTreeMap<Address, String> = BTreeMap::new();
        for owned in state.points.values() {
            names.insert(owned.point.address, owned.point.name().to_string());
        }
        drop(state);

        let mut next_state = self.state.write();
        let system_folio = next_state.system_advertisement_folio;
        next_state.system_advertisement_folio = system_folio.wrapping_add(1);
        let name_folio = next_state.name_advertisement_folio;
        next_state.name_advertisement_folio = name_folio.wrapping_add(1);
        drop(next_state);

        let name = self.name();
        let system_pages = systems
            .chunks(config::MAX_SYSTEM_RECORDS_PER_DATAGRAM)
            .collect::<Vec<_>>();
        let system_last_page = system_pages.len().saturating_sub(1).max(0) as u16;
        let system_datagrams: Vec<Vec<u8>> = if systems.is_empty() {
            vec![self.build_advertisement(
                &name,
                system_folio,
                0,
                0,
                AdvertisementLayer::System(SystemAdvertisement { is_response: true, systems: vec![] }),
            )]
        } else {
            system_pages
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    self.build_advertisement(
                        &name,
                        system_folio,
                        i as u16,
                        system_last_page,
                        AdvertisementLayer::System(SystemAdvertisement {
                            is_response: true,
                            systems: chunk.to_vec(),
                        }),
                    )
                })
                .collect()
        };
        self.cached_system_response.store(Arc::new(system_datagrams));

        let records: Vec<AddressPointDescription> = names
            .iter()
            .map(|(addr, name)| AddressPointDescription {
                system: addr.system as u8,
                group: addr.group as u16,
                point: addr.point,
                name: name.clone(),
            })
            .collect();
        let name_pages: Vec<&[AddressPointDescription]> =
            records.chunks(config::MAX_NAME_RECORDS_PER_DATAGRAM).collect();
        let name_last_page = name_pages.len().saturating_sub(1).max(0) as u16;
        let name_datagrams: Vec<Vec<u8>> = if records.is_empty() {
            vec![self.build_advertisement(
                &name,
                name_folio,
                0,
                0,
                AdvertisementLayer::Name(NameAdvertisement { is_response: true, records: vec![] }),
            )]
        } else {
            name_pages
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    self.build_advertisement(
                        &name,
                        name_folio,
                        i as u16,
                        name_last_page,
                        AdvertisementLayer::Name(NameAdvertisement {
                            is_response: true,
                            records: chunk.to_vec(),
                        }),
                    )
                })
                .collect()
        };
        self.cached_name_response.store(Arc::new(name_datagrams));
    }

    fn build_advertisement(
        &self,
        name: &str,
        folio_number: u32,
        page: u16,
        last_page: u16,
        body: AdvertisementLayer,
    ) -> Vec<u8> {
        let layer = OtpLayer {
            source_cid: self.cid,
            folio_number,
            page,
            last_page,
            options: 0,
            component_name: name.to_string(),
            body: OtpBody::Advertisement(body),
        };
        let mut buf = vec![0u8; layer.wire_len()];
        layer.encode(&mut Writer::new(&mut buf)).expect("encode buffer sized from wire_len");
        buf
    }
}
