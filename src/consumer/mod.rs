//! Consumer engine: discovers producers, reassembles transform folios,
//! merges same-address points by priority, and observes the result.

pub mod state;

use crate::address::{Address, ModuleIdentifier};
use crate::cid::Cid;
use crate::codec::advertisement::{
    AddressPointDescription, AdvertisementLayer, ModuleAdvertisement, NameAdvertisement,
    SystemAdvertisement,
};
use crate::codec::cursor::Writer;
use crate::codec::module_layer::PointLayer;
use crate::codec::otp_layer::{OtpBody, OtpLayer};
use crate::config;
use crate::error::{SocketError, StartError};
use crate::event::{ConsumerDelegate, ConsumerEvent, ErrorEvent, PeerStatus};
use crate::folio::{Acceptance, FolioEvent};
use crate::modules::ModuleRegistry;
use crate::peer::{IpMode, ProducerPeer, Visibility};
use crate::point::Point;
use crate::transport::{AddressResolver, MulticastMembership, Scheduler, Socket, TimerHandle};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use state::ConsumerState;

/// Already-bound socket and multicast-membership handles the host hands to
/// a consumer at construction. A family's handles are
/// `None` when that family is disabled by `ip_mode`. There is no
/// `transform_*` socket pair here: a consumer never transmits on the
/// transform channel, it only ever has `receive()` called with datagrams
/// the host already read off whichever socket they arrived on.
#[derive(Default)]
pub struct ConsumerSockets {
    pub advertisement_v4: Option<Arc<dyn Socket>>,
    pub advertisement_v6: Option<Arc<dyn Socket>>,
    pub multicast_v4: Option<Arc<dyn MulticastMembership>>,
    pub multicast_v6: Option<Arc<dyn MulticastMembership>>,
}

/// An OTP Consumer: tracks discovered producers, reassembles their
/// transform folios, merges same-address points by priority, and delivers
/// the result plus discovery/liveliness events to a delegate.
pub struct Consumer {
    cid: Cid,
    name: RwLock<String>,
    config: crate::config::ConsumerConfig,
    sockets: ConsumerSockets,
    scheduler: Arc<dyn Scheduler>,
    resolver: Arc<dyn AddressResolver>,
    delegate: Arc<dyn ConsumerDelegate>,
    registry: ModuleRegistry,
    state: RwLock<ConsumerState>,
    producers: DashMap<Cid, Arc<Mutex<ProducerPeer>>>,
    last_snapshot: Mutex<Vec<Point>>,
    timers: Mutex<Vec<TimerHandle>>,
    started: AtomicBool,
}

impl Consumer {
    pub fn new(
        config: crate::config::ConsumerConfig,
        sockets: ConsumerSockets,
        scheduler: Arc<dyn Scheduler>,
        resolver: Arc<dyn AddressResolver>,
        delegate: Arc<dyn ConsumerDelegate>,
        registry: ModuleRegistry,
    ) -> Arc<Self> {
        let cid = config.cid;
        let name = RwLock::new(config.name.clone());
        let mut state = ConsumerState::new();
        state.module_types = config.module_types.iter().copied().collect();
        state.observed_systems = config.observed_systems.iter().copied().collect();
        Arc::new(Self {
            cid,
            name,
            config,
            sockets,
            scheduler,
            resolver,
            delegate,
            registry,
            state: RwLock::new(state),
            producers: DashMap::new(),
            last_snapshot: Mutex::new(Vec::new()),
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

    /// Bind+join happen entirely on the host before construction; `start`
    /// only validates the sockets it was given and arms the timer cascade
    ///. Two independent tracks: module
    /// advertisement, the data-loss scan, and the delegate-notification
    /// timer begin immediately; system-advertisement requests wait the 12s
    /// initial delay first.
    pub fn start(self: &Arc<Self>) -> Result<(), StartError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StartError::AlreadyStarted);
        }
        self.validate_sockets()?;

        let mut handles = Vec::new();

        let module_advertisement = Arc::clone(self);
        handles.push(self.scheduler.every(
            config::MODULE_ADVERTISEMENT_PERIOD,
            Box::new(move || module_advertisement.tick_module_advertisement()),
        ));

        let loss = Arc::clone(self);
        handles.push(self.scheduler.every(
            config::DATA_LOSS_SCAN_PERIOD,
            Box::new(move || loss.scan_data_loss()),
        ));

        let delegate_tick = Arc::clone(self);
        handles.push(self.scheduler.every(
            self.config.delegate_interval,
            Box::new(move || delegate_tick.tick_delegate()),
        ));

        self.timers.lock().extend(handles);

        let me = Arc::clone(self);
        let initial_wait_handle = self.scheduler.after(
            config::INITIAL_WAIT,
            Box::new(move || me.arm_system_advertisement_timer()),
        );
        self.timers.lock().push(initial_wait_handle);
        Ok(())
    }

    fn validate_sockets(&self) -> Result<(), StartError> {
        let needs_v4 = matches!(self.config.ip_mode, IpMode::IPv4Only | IpMode::IPv4And6);
        let needs_v6 = matches!(self.config.ip_mode, IpMode::IPv6Only | IpMode::IPv4And6);
        if needs_v4
            && (self.sockets.advertisement_v4.is_none() || self.sockets.multicast_v4.is_none())
        {
            return Err(SocketError::CouldNotBind("ipv4 socket not provided".into()).into());
        }
        if needs_v6
            && (self.sockets.advertisement_v6.is_none() || self.sockets.multicast_v6.is_none())
        {
            return Err(SocketError::CouldNotBind("ipv6 socket not provided".into()).into());
        }
        Ok(())
    }

    /// Arms the periodic system-advertisement request timer; fired once the
    /// 12s initial wait elapses, then begins periodic system-advertisement
    /// requests every 10s.
    fn arm_system_advertisement_timer(self: &Arc<Self>) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let me = Arc::clone(self);
        let handle = self.scheduler.every(
            config::SYSTEM_ADVERTISEMENT_PERIOD,
            Box::new(move || me.tick_system_advertisement_request()),
        );
        self.timers.lock().push(handle);
    }

    /// Cancels every timer; sockets and multicast membership are the host's
    /// to tear down.
    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        let mut handles = self.timers.lock();
        for handle in handles.drain(..) {
            self.scheduler.cancel(handle);
        }
    }

    // ------------------------------------------------------------------
    // Public declared-interest API
    // ------------------------------------------------------------------

    pub fn update_name(&self, name: &str) {
        *self.name.write() =
            crate::codec::cursor::truncate_to_utf8_boundary(name, config::NAME_LENGTH).to_string();
    }

    pub fn add_module_types(&self, identifiers: &[ModuleIdentifier]) {
        self.state.write().module_types.extend(identifiers.iter().copied());
    }

    pub fn remove_module_types(&self, identifiers: &[ModuleIdentifier]) {
        let mut state = self.state.write();
        for id in identifiers {
            state.module_types.remove(id);
        }
    }

    /// Replaces the observed-system set outright (`observeSystemNumbers`);
    /// the next system-advertisement request cycle picks up the change.
    pub fn observe_system_numbers(&self, systems: &[u8]) {
        self.state.write().observed_systems = systems.iter().copied().collect();
    }

    /// Send an immediate, unsolicited name-advertisement request (vector
    /// 0x0002, `isResponse = false`).
    pub fn request_producer_point_names(self: &Arc<Self>) {
        let name = self.name();
        let folio = {
            let mut state = self.state.write();
            let f = state.name_advertisement_folio;
            state.name_advertisement_folio = f.wrapping_add(1);
            f
        };
        let dg = self.build_advertisement(
            &name,
            folio,
            0,
            0,
            AdvertisementLayer::Name(NameAdvertisement { is_response: false, records: vec![] }),
        );
        self.broadcast_advertisement(&dg);
    }

    // ------------------------------------------------------------------
    // Receive path (host calls this once it has read a datagram off an
    // advertisement or transform socket)
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

        let now_us = self.scheduler.now_micros();
        let peer_handle = Arc::clone(&self.producers.entry(layer.source_cid).or_insert_with(|| {
            Arc::new(Mutex::new(ProducerPeer::new(
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

        match layer.body {
            OtpBody::Transform(t) => {
                let system = t.system;
                let cid = peer.cid;
                let points = self.decode_points(cid, system, &t.points);
                let event = {
                    let window = config::TRANSFORM_FOLIO_WINDOW as u32;
                    let s = peer.system_mut(system, window);
                    s.window.ingest(
                        &mut s.sequence,
                        layer.folio_number,
                        layer.page,
                        layer.last_page,
                        t.full_point_set,
                        points,
                    )
                };
                self.apply_transform_event(&mut peer, system, now_us, event);
            }
            OtpBody::Advertisement(AdvertisementLayer::Name(n)) if n.is_response => {
                let acceptance = peer.name_advertisement_tracker.accept(
                    layer.folio_number,
                    layer.page,
                    config::ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW,
                );
                if let Some(fresh) = self.handle_advertisement_acceptance(&mut peer, acceptance, now_us) {
                    if fresh {
                        peer.clear_point_names();
                    }
                    let records = n
                        .records
                        .iter()
                        .filter_map(|r| r.validate().ok().map(|addr| (addr, r.name.clone())));
                    peer.refresh_point_names(records);
                }
            }
            OtpBody::Advertisement(AdvertisementLayer::System(s)) if s.is_response => {
                let acceptance = peer.system_advertisement_tracker.accept(
                    layer.folio_number,
                    layer.page,
                    config::ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW,
                );
                if let Some(fresh) = self.handle_advertisement_acceptance(&mut peer, acceptance, now_us) {
                    if fresh {
                        peer.set_advertised_systems(s.systems);
                    } else {
                        peer.extend_advertised_systems(s.systems);
                    }
                }
            }
            _ => {
                // Module advertisements (other consumers) and name/system
                // requests (a producer never issues these, another consumer
                // isn't this engine's concern): nothing to do.
            }
        }
    }

    /// Decode wire `PointLayer`s into owned `Point`s via the module
    /// registry; unknown module identifiers are skipped silently (spec.md
    /// §4.1), decode failures are surfaced on the error channel and that
    /// module is dropped.
    fn decode_points(&self, producer_cid: Cid, system: u8, layers: &[PointLayer]) -> Vec<Point> {
        let mut points = Vec::with_capacity(layers.len());
        for layer in layers {
            let address = match Address::new(system as u32, layer.group as u32, layer.point) {
                Ok(a) => a,
                Err(_) => continue,
            };
            let mut point = Point::new(address, crate::address::Priority::new(layer.priority as u32).unwrap_or_default(), "", producer_cid);
            for m in &layer.modules {
                match self.registry.decode(m.identifier, &m.data) {
                    Ok(Some(value)) => point.set_module(value),
                    Ok(None) => {} // unrecognized identifier: skipped
                    Err(e) => self.delegate.on_error(ErrorEvent::LayerError(e.to_string())),
                }
            }
            point.mark_sampled();
            points.push(point);
        }
        points
    }

    fn apply_transform_event(
        &self,
        peer: &mut ProducerPeer,
        system: u8,
        now_us: u64,
        event: FolioEvent,
    ) {
        match event {
            FolioEvent::SequenceRejected => {
                peer.sequence_errors += 1;
                self.delegate.on_error(ErrorEvent::SequenceError(format!(
                    "folio out of window for producer {}",
                    peer.cid
                )));
                self.notify_status(peer);
            }
            FolioEvent::DuplicatePage => {}
            FolioEvent::Buffered => {
                peer.last_transform_us = Some(now_us);
                if peer.visibility != Visibility::Online {
                    peer.visibility = Visibility::Online;
                }
                self.notify_status(peer);
            }
            FolioEvent::Promoted { full_point_set, points } => {
                peer.last_transform_us = Some(now_us);
                if peer.visibility != Visibility::Online {
                    peer.visibility = Visibility::Online;
                }
                self.notify_status(peer);
                let points = self.rename_from_table(peer, points);
                peer.system_mut(system, config::TRANSFORM_FOLIO_WINDOW as u32)
                    .apply(full_point_set, points);
            }
            FolioEvent::PartialFlushed { points } => {
                peer.last_transform_us = Some(now_us);
                if peer.visibility != Visibility::Online {
                    peer.visibility = Visibility::Online;
                }
                self.notify_status(peer);
                let points = self.rename_from_table(peer, points);
                peer.system_mut(system, config::TRANSFORM_FOLIO_WINDOW as u32)
                    .apply(false, points);
            }
        }
    }

    /// Refresh each point's name from the producer's last address-point
    /// description table (spec.md §4.3: the transform wire format carries
    /// no name field at all, only the separate name-advertisement mechanism
    /// does).
    fn rename_from_table(&self, peer: &ProducerPeer, mut points: Vec<Point>) -> Vec<Point> {
        for p in &mut points {
            if let Some(name) = peer.point_name(p.address) {
                p.rename(name);
            }
        }
        points
    }

    /// Returns `None` if the folio was rejected or a duplicate (caller
    /// should stop processing); otherwise `Some(fresh)`, where `fresh`
    /// indicates this page started a new response folio (the peer's prior
    /// snapshot for this advertisement kind should be discarded rather than
    /// unioned into).
    fn handle_advertisement_acceptance(
        &self,
        peer: &mut ProducerPeer,
        acceptance: Acceptance,
        now_us: u64,
    ) -> Option<bool> {
        match acceptance {
            Acceptance::OutOfWindow => {
                peer.sequence_errors += 1;
                self.delegate.on_error(ErrorEvent::SequenceError(format!(
                    "folio out of window for producer {}",
                    peer.cid
                )));
                self.notify_status(peer);
                None
            }
            Acceptance::DuplicatePage => None,
            Acceptance::FirstMessage | Acceptance::NewFolio => {
                peer.last_advertisement_us = Some(now_us);
                if peer.visibility == Visibility::Offline {
                    peer.visibility = Visibility::Advertising;
                }
                self.notify_status(peer);
                Some(true)
            }
            Acceptance::SameFolioNewPage => {
                peer.last_advertisement_us = Some(now_us);
                if peer.visibility == Visibility::Offline {
                    peer.visibility = Visibility::Advertising;
                }
                self.notify_status(peer);
                Some(false)
            }
        }
    }

    /// `declaredModules` for a producer peer is derived from the module
    /// identifiers currently present on its known points -- producers never
    /// send a module advertisement of their own, unlike consumers.
    fn notify_status(&self, peer: &ProducerPeer) {
        let mut ids: Vec<ModuleIdentifier> = peer
            .systems()
            .flat_map(|(_, s)| s.points.values())
            .flat_map(|p| p.module_identifiers())
            .collect();
        ids.sort();
        ids.dedup();
        self.delegate.on_event(ConsumerEvent::ProducerStatusChanged(PeerStatus {
            cid: peer.cid,
            name: peer.name.clone(),
            ip_mode: peer.ip_mode,
            ip_addresses: peer.ip_addresses.clone(),
            sequence_errors: peer.sequence_errors,
            state: peer.visibility,
            declared_modules: ids,
        }));
    }

    // ------------------------------------------------------------------
    // Timer bodies
    // ------------------------------------------------------------------

    fn tick_module_advertisement(self: &Arc<Self>) {
        let name = self.name();
        let ids: Vec<ModuleIdentifier> = self.state.read().module_types.iter().copied().collect();
        let folio = {
            let mut state = self.state.write();
            let f = state.module_advertisement_folio;
            state.module_advertisement_folio = f.wrapping_add(1);
            f
        };
        let pages: Vec<&[ModuleIdentifier]> =
            ids.chunks(config::MAX_MODULE_IDENTIFIERS_PER_DATAGRAM).collect();
        let last_page = pages.len().saturating_sub(1).max(0) as u16;
        let datagrams: Vec<Vec<u8>> = if ids.is_empty() {
            vec![self.build_advertisement(
                &name,
                folio,
                0,
                0,
                AdvertisementLayer::Module(ModuleAdvertisement { module_identifiers: vec![] }),
            )]
        } else {
            pages
                .iter()
                .enumerate()
                .map(|(i, chunk)| {
                    self.build_advertisement(
                        &name,
                        folio,
                        i as u16,
                        last_page,
                        AdvertisementLayer::Module(ModuleAdvertisement {
                            module_identifiers: chunk.to_vec(),
                        }),
                    )
                })
                .collect()
        };
        for dg in &datagrams {
            self.broadcast_advertisement(dg);
        }
    }

    fn tick_system_advertisement_request(self: &Arc<Self>) {
        let name = self.name();
        let folio = {
            let mut state = self.state.write();
            let f = state.system_advertisement_folio;
            state.system_advertisement_folio = f.wrapping_add(1);
            f
        };
        let dg = self.build_advertisement(
            &name,
            folio,
            0,
            0,
            AdvertisementLayer::System(SystemAdvertisement { is_response: false, systems: vec![] }),
        );
        self.broadcast_advertisement(&dg);

        let me = Arc::clone(self);
        let handle = self.scheduler.after(
            config::SYSTEM_ADVERTISEMENT_NOTIFY_DELAY,
            Box::new(move || me.notify_discovered_systems_and_resubscribe()),
        );
        self.timers.lock().push(handle);
    }

    /// `discoveredSystemNumbers` reports the union of every system any
    /// producer has ever advertised, regardless of `observedSystems`;
    /// multicast subscription, by contrast, is restricted to the
    /// intersection with `observedSystems`.
    fn notify_discovered_systems_and_resubscribe(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let mut discovered: Vec<u8> = Vec::new();
        for entry in self.producers.iter() {
            let peer = entry.value().lock();
            discovered.extend(peer.advertised_systems().copied());
        }
        discovered.sort_unstable();
        discovered.dedup();
        self.delegate
            .on_event(ConsumerEvent::DiscoveredSystemNumbers(discovered.clone()));

        let observed = self.state.read().observed_systems.clone();
        let target: HashSet<u8> = discovered.into_iter().filter(|s| observed.contains(s)).collect();
        self.resubscribe(target);
    }

    /// Leave groups for `currently_joined ∖ target`, join for
    /// `target ∖ currently_joined`. A failed join is not recorded (retried
    /// next cycle); a failed leave keeps the group as joined (spec.md §4.3
    /// "System subscription").
    fn resubscribe(&self, target: HashSet<u8>) {
        let mut state = self.state.write();
        let currently_joined = state.joined_systems.clone();

        for system in currently_joined.difference(&target) {
            if self.leave_system(*system) {
                state.joined_systems.remove(system);
            }
        }
        for system in target.difference(&currently_joined) {
            if self.join_system(*system) {
                state.joined_systems.insert(*system);
            }
        }
    }

    fn join_system(&self, system: u8) -> bool {
        let mut ok = true;
        if let Some(mc) = &self.sockets.multicast_v4 {
            let group = self.resolver.transform_group(system, false);
            if mc.join(group).is_err() {
                ok = false;
            }
        }
        if let Some(mc) = &self.sockets.multicast_v6 {
            let group = self.resolver.transform_group(system, true);
            if mc.join(group).is_err() {
                ok = false;
            }
        }
        ok
    }

    fn leave_system(&self, system: u8) -> bool {
        let mut ok = true;
        if let Some(mc) = &self.sockets.multicast_v4 {
            let group = self.resolver.transform_group(system, false);
            if mc.leave(group).is_err() {
                ok = false;
            }
        }
        if let Some(mc) = &self.sockets.multicast_v6 {
            let group = self.resolver.transform_group(system, true);
            if mc.leave(group).is_err() {
                ok = false;
            }
        }
        ok
    }

    /// Demote an `Online` producer to `Offline` after 7500 ms of transform
    /// silence, or an `Advertising` producer after 60 s of advertisement
    /// silence.
    fn scan_data_loss(&self) {
        let now_us = self.scheduler.now_micros();
        let advertising_timeout_us = config::ADVERTISING_TIMEOUT.as_micros() as u64;
        let transform_timeout_us = config::TRANSFORM_TIMEOUT.as_micros() as u64;
        for entry in self.producers.iter() {
            let mut peer = entry.value().lock();
            let demote = match peer.visibility {
                Visibility::Offline => false,
                Visibility::Online => {
                    now_us.saturating_sub(peer.last_transform_us.unwrap_or(0)) > transform_timeout_us
                }
                Visibility::Advertising => {
                    now_us.saturating_sub(peer.last_advertisement_us.unwrap_or(0))
                        > advertising_timeout_us
                }
            };
            if demote {
                peer.visibility = Visibility::Offline;
                peer.reset_on_offline();
                self.notify_status(&peer);
            }
        }
    }

    /// Merge every online producer's points by address at the highest
    /// priority present, diff against the last-delivered snapshot, and
    /// emit `ReplaceAllPoints` (address set changed) or `Changes` (content
    /// differs at the same addresses).
    fn tick_delegate(&self) {
        let current = self.merge_all();
        let mut last = self.last_snapshot.lock();

        let addresses_changed = current.len() != last.len()
            || current.iter().zip(last.iter()).any(|(a, b)| a.address != b.address);

        if addresses_changed {
            self.delegate.on_event(ConsumerEvent::ReplaceAllPoints(current.clone()));
        } else {
            let changed: Vec<Point> = current
                .iter()
                .zip(last.iter())
                .filter(|(a, b)| !points_equal(a, b))
                .map(|(a, _)| a.clone())
                .collect();
            if !changed.is_empty() {
                self.delegate.on_event(ConsumerEvent::Changes(changed));
            }
        }

        *last = current;
    }

    fn merge_all(&self) -> Vec<Point> {
        let mut by_address: HashMap<Address, Vec<Point>> = HashMap::new();
        for entry in self.producers.iter() {
            let peer = entry.value().lock();
            if peer.visibility != Visibility::Online {
                continue;
            }
            for (_, system) in peer.systems() {
                for point in system.points.values() {
                    by_address.entry(point.address).or_default().push(point.clone());
                }
            }
        }

        let mut merged: Vec<Point> = Vec::new();
        for points in by_address.into_values() {
            let Some(max_priority) = points.iter().map(|p| p.priority).max() else {
                continue;
            };
            let contributors: Vec<&Point> =
                points.iter().filter(|p| p.priority == max_priority).collect();
            if let Some(m) = Point::merge(&contributors) {
                merged.push(m);
            }
        }
        merged.sort_by_key(|p| p.address);
        merged
    }

    // ------------------------------------------------------------------
    // Outgoing datagram helpers
    // ------------------------------------------------------------------

    fn broadcast_advertisement(&self, datagram: &[u8]) {
        if let Some(socket) = &self.sockets.advertisement_v4 {
            let _ = socket.send_to(datagram, self.resolver.advertisement_group(false));
        }
        if let Some(socket) = &self.sockets.advertisement_v6 {
            let _ = socket.send_to(datagram, self.resolver.advertisement_group(true));
        }
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

/// Two points are equivalent for delta-emission purposes when priority,
/// name, and every module's value all match (spec.md §4.3 "Changes ...
/// points whose modules, priority, or name differ").
fn points_equal(a: &Point, b: &Point) -> bool {
    if a.priority != b.priority || a.name() != b.name() {
        return false;
    }
    let mut ids_a: Vec<_> = a.module_identifiers().collect();
    let mut ids_b: Vec<_> = b.module_identifiers().collect();
    if ids_a.len() != ids_b.len() {
        return false;
    }
    ids_a.sort();
    ids_b.sort();
    if ids_a != ids_b {
        return false;
    }
    ids_a.iter().all(|id| match (a.module(*id), b.module(*id)) {
        (Some(x), Some(y)) => x.equals(y),
        _ => false,
    })
}
