//! Per-peer address-family tracking.

use std::net::IpAddr;

/// A peer's observed address family mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpMode {
    IPv4Only,
    IPv6Only,
    IPv4And6,
}

/// Whether an arriving datagram should be processed, or merely recorded.
/// An IPv6-first peer that sees IPv4 traffic records the address but still
/// rejects the message for processing, preferring IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    RecordOnly,
}

/// Evaluate an arriving datagram's family against the peer's current mode
/// and update it in place. `was_offline` short-circuits to
/// "reset the mode to reflect the arriving family and accept".
pub fn evaluate(mode: &mut IpMode, incoming_is_ipv6: bool, was_offline: bool) -> Admission {
    if was_offline {
        *mode = if incoming_is_ipv6 {
            IpMode::IPv6Only
        } else {
            IpMode::IPv4Only
        };
        return Admission::Accept;
    }

    match (*mode, incoming_is_ipv6) {
        (IpMode::IPv4Only, true) => {
            *mode = IpMode::IPv4And6;
            Admission::Accept
        }
        (IpMode::IPv4Only, false) => Admission::Accept,
        (IpMode::IPv6Only, false) => {
            *mode = IpMode::IPv4And6;
            Admission::RecordOnly
        }
        (IpMode::IPv6Only, true) => Admission::Accept,
        (IpMode::IPv4And6, true) => Admission::Accept,
        (IpMode::IPv4And6, false) => Admission::RecordOnly,
    }
}

/// Insert `addr` into a deduplicated, sorted address list.
pub fn record_address(addresses: &mut Vec<IpAddr>, addr: IpAddr) {
    if let Err(pos) = addresses.binary_search(&addr) {
        addresses.insert(pos, addr);
    }
}
