//! Observation surface: event structures and the delegate traits a host
//! application implements to receive them.
//! Delegates are invoked outside any internal lock.

use crate::address::ModuleIdentifier;
use crate::cid::Cid;
use crate::peer::{IpMode, Visibility};
use crate::point::Point;
use std::net::IpAddr;

/// Snapshot of a peer's liveliness state delivered alongside a status-change
/// event: CID, name, IP mode, IP addresses, sequence-errors, visibility
/// state, and declared module identifiers.
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub cid: Cid,
    pub name: String,
    pub ip_mode: IpMode,
    pub ip_addresses: Vec<IpAddr>,
    pub sequence_errors: u32,
    pub state: Visibility,
    pub declared_modules: Vec<ModuleIdentifier>,
}

/// Events a producer delivers about its discovered consumers.
#[derive(Debug, Clone)]
pub enum ProducerEvent {
    ConsumerStatusChanged(PeerStatus),
}

/// Events a consumer delivers about merged points and discovered producers.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    ReplaceAllPoints(Vec<Point>),
    Changes(Vec<Point>),
    ProducerStatusChanged(PeerStatus),
    DiscoveredSystemNumbers(Vec<u8>),
}

/// Non-fatal failures surfaced on the error channel.
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    LayerError(String),
    SequenceError(String),
    UnknownError(String),
}

/// Implement this trait to receive callbacks from a producer. All methods
/// have default no-op implementations.
pub trait ProducerDelegate: Send + Sync {
    fn on_event(&self, _event: ProducerEvent) {}
    fn on_error(&self, _event: ErrorEvent) {}
}

/// Implement this trait to receive callbacks from a consumer. All methods
/// have default no-op implementations.
pub trait ConsumerDelegate: Send + Sync {
    fn on_event(&self, _event: ConsumerEvent) {}
    fn on_error(&self, _event: ErrorEvent) {}
}
