//! Shared fakes for the end-to-end scenario tests (spec.md §8): a
//! deterministic virtual-clock scheduler plus recording socket, multicast,
//! resolver, and delegate fakes. No real timers, threads, or sockets.

use otp_core::transport::{AddressResolver, MulticastMembership, Scheduler, Socket, TimerHandle};
use otp_core::{ConsumerEvent, ConsumerDelegate, ErrorEvent, ProducerDelegate, ProducerEvent};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum TimerCallback {
    Once(Option<Box<dyn FnOnce() + Send>>),
    Repeating(Box<dyn FnMut() + Send>),
}

struct TimerEntry {
    id: u64,
    next_fire_us: u64,
    period_us: Option<u64>,
    callback: TimerCallback,
}

/// A manually-advanced scheduler: `every` fires its callback immediately at
/// registration (matching the engines' own "begin periodic emission
/// immediately" contract, spec.md §4.2/§4.3) and then again every `period`
/// as the clock is advanced; `after` fires once, `delay` in the future.
pub struct VirtualScheduler {
    now_us: AtomicU64,
    next_id: AtomicU64,
    timers: Mutex<Vec<TimerEntry>>,
}

impl VirtualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now_us: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            timers: Mutex::new(Vec::new()),
        })
    }

    /// Move the virtual clock forward by `delta`, firing every timer whose
    /// due time falls at or before the new time, in due-time order.
    /// Callbacks that register further timers (e.g. a reply scheduled from
    /// within a received-datagram handler) are picked up by the same
    /// advance if their due time is still within range.
    pub fn advance(&self, delta: Duration) {
        let target = self.now_us.load(Ordering::SeqCst) + delta.as_micros() as u64;
        loop {
            let due = {
                let mut timers = self.timers.lock().unwrap();
                let idx = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.next_fire_us <= target)
                    .min_by_key(|(_, t)| t.next_fire_us)
                    .map(|(i, _)| i);
                idx.map(|i| timers.remove(i))
            };
            let Some(mut entry) = due else { break };
            self.now_us.store(entry.next_fire_us, Ordering::SeqCst);
            match &mut entry.callback {
                TimerCallback::Once(f) => {
                    if let Some(f) = f.take() {
                        f();
                    }
                }
                TimerCallback::Repeating(f) => f(),
            }
            if let Some(period) = entry.period_us {
                entry.next_fire_us += period;
                self.timers.lock().unwrap().push(entry);
            }
        }
        self.now_us.store(target, Ordering::SeqCst);
    }
}

impl Scheduler for VirtualScheduler {
    fn now_micros(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    fn after(&self, delay: Duration, f: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fire_at = self.now_micros() + delay.as_micros() as u64;
        self.timers.lock().unwrap().push(TimerEntry {
            id,
            next_fire_us: fire_at,
            period_us: None,
            callback: TimerCallback::Once(Some(f)),
        });
        TimerHandle { id, generation: 0 }
    }

    fn every(&self, period: Duration, mut f: Box<dyn FnMut() + Send>) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        f();
        let fire_at = self.now_micros() + period.as_micros() as u64;
        self.timers.lock().unwrap().push(TimerEntry {
            id,
            next_fire_us: fire_at,
            period_us: Some(period.as_micros() as u64),
            callback: TimerCallback::Repeating(f),
        });
        TimerHandle { id, generation: 0 }
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers.lock().unwrap().retain(|t| t.id != handle.id);
    }
}

/// Captures every datagram sent through it instead of touching a real
/// socket.
pub struct RecordingSocket {
    local: SocketAddr,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

impl RecordingSocket {
    pub fn new(local: SocketAddr) -> Arc<Self> {
        Arc::new(Self { local, sent: Mutex::new(Vec::new()) })
    }

    /// Drain every datagram sent since the last call.
    pub fn take_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

impl Socket for RecordingSocket {
    fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.sent.lock().unwrap().push((buf.to_vec(), dest));
        Ok(buf.len())
    }
    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
    fn is_ipv6(&self) -> bool {
        self.local.is_ipv6()
    }
}

/// Always succeeds; records joined/left groups for assertions.
#[derive(Default)]
pub struct RecordingMulticastMembership {
    joined: Mutex<Vec<SocketAddr>>,
    left: Mutex<Vec<SocketAddr>>,
}

impl RecordingMulticastMembership {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn joined(&self) -> Vec<SocketAddr> {
        self.joined.lock().unwrap().clone()
    }
}

impl MulticastMembership for RecordingMulticastMembership {
    fn join(&self, group: SocketAddr) -> io::Result<()> {
        self.joined.lock().unwrap().push(group);
        Ok(())
    }
    fn leave(&self, group: SocketAddr) -> io::Result<()> {
        self.left.lock().unwrap().push(group);
        Ok(())
    }
}

/// Deterministic group addresses: one advertisement group per family, one
/// transform group per system number, encoded into the last octet so tests
/// can tell groups apart.
pub struct FixedResolver;

impl AddressResolver for FixedResolver {
    fn advertisement_group(&self, ipv6: bool) -> SocketAddr {
        if ipv6 {
            "[ff15::1]:6454".parse().unwrap()
        } else {
            "239.1.1.1:6454".parse().unwrap()
        }
    }
    fn transform_group(&self, system: u8, ipv6: bool) -> SocketAddr {
        if ipv6 {
            format!("[ff15::{system:x}]:6454").parse().unwrap()
        } else {
            format!("239.1.2.{system}:6454").parse().unwrap()
        }
    }
}

#[derive(Default)]
pub struct RecordingProducerDelegate {
    events: Mutex<Vec<ProducerEvent>>,
    errors: Mutex<Vec<ErrorEvent>>,
}

impl RecordingProducerDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    pub fn events(&self) -> Vec<ProducerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProducerDelegate for RecordingProducerDelegate {
    fn on_event(&self, event: ProducerEvent) {
        self.events.lock().unwrap().push(event);
    }
    fn on_error(&self, event: ErrorEvent) {
        self.errors.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingConsumerDelegate {
    events: Mutex<Vec<ConsumerEvent>>,
    errors: Mutex<Vec<ErrorEvent>>,
}

impl RecordingConsumerDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    pub fn events(&self) -> Vec<ConsumerEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConsumerDelegate for RecordingConsumerDelegate {
    fn on_event(&self, event: ConsumerEvent) {
        self.events.lock().unwrap().push(event);
    }
    fn on_error(&self, event: ErrorEvent) {
        self.errors.lock().unwrap().push(event);
    }
}
