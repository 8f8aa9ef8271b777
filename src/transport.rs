//! Host-supplied transport and scheduling boundary. This crate never binds
//! a socket, joins a multicast group, or spawns an OS thread; both traits
//! here are implemented by the host application and handed to a producer
//! or consumer at construction.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// A cancellable timer handle. Carries a generation counter so a fired
/// callback can check it is still current before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    pub id: u64,
    pub generation: u64,
}

/// A bound, already-joined UDP socket handle owned by the host. The engine
/// only ever calls `send_to` on a handle it was given; bind/join/leave stay
/// a host concern.
pub trait Socket: Send + Sync {
    fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
    fn is_ipv6(&self) -> bool;
}

/// The scheduling primitive a producer or consumer engine needs: current
/// time and one-shot/repeating timers.
pub trait Scheduler: Send + Sync {
    /// Microseconds elapsed since this scheduler's time origin; the engine
    /// never calls a wall-clock API directly.
    fn now_micros(&self) -> u64;
    fn after(&self, delay: Duration, f: Box<dyn FnOnce() + Send>) -> TimerHandle;
    fn every(&self, period: Duration, f: Box<dyn FnMut() + Send>) -> TimerHandle;
    fn cancel(&self, handle: TimerHandle);
}

/// Resolves the multicast destination for a given family and system number:
/// one advertisement group per enabled IP family, and one transform group
/// per system number per family, derived from the published OTP address
/// allocations. The host supplies the mapping; this crate never hardcodes
/// an address allocation.
pub trait AddressResolver: Send + Sync {
    fn advertisement_group(&self, ipv6: bool) -> SocketAddr;
    fn transform_group(&self, system: u8, ipv6: bool) -> SocketAddr;
}

/// Join/leave a multicast group on a socket the host already bound. The
/// consumer engine leaves groups for `currently_joined ∖ target` and joins
/// for `target ∖ currently_joined`; a failed join is not recorded (retried
/// next cycle) and a failed leave keeps the group as joined. Bind itself
/// stays entirely a host concern; this is only the narrow join/leave
/// surface the consumer engine needs to drive per-system subscription.
pub trait MulticastMembership: Send + Sync {
    fn join(&self, group: SocketAddr) -> Result<(), io::Error>;
    fn leave(&self, group: SocketAddr) -> Result<(), io::Error>;
}
