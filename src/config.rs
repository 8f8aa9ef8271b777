//! OTP protocol constants and runtime configuration.
//!
//! Centralizes the numeric constants fixed by the wire protocol so they are
//! never hardcoded at call sites.

use std::time::Duration;

// =======================================================================
// Wire-level fixed sizes
// =======================================================================

/// 12-byte literal packet identifier every OTP layer begins with.
pub const PACKET_IDENTIFIER: [u8; 12] = [
    0x4F, 0x54, 0x50, 0x2D, 0x45, 0x31, 0x2E, 0x35, 0x39, 0x00, 0x00, 0x00,
];

/// Fixed OTP layer header length in bytes, before the body.
pub const OTP_LAYER_HEADER_LEN: usize = 79;

/// Component name field width (NUL-padded UTF-8).
pub const NAME_LENGTH: usize = 32;

/// Vector identifying an OTP transform layer.
pub const VECTOR_OTP_TRANSFORM: u16 = 0xFF01;
/// Vector identifying an OTP advertisement layer.
pub const VECTOR_OTP_ADVERTISEMENT: u16 = 0xFF02;

/// Advertisement inner-layer vector: module advertisement.
pub const VECTOR_ADVERTISEMENT_MODULE: u16 = 0x0001;
/// Advertisement inner-layer vector: name advertisement.
pub const VECTOR_ADVERTISEMENT_NAME: u16 = 0x0002;
/// Advertisement inner-layer vector: system advertisement.
pub const VECTOR_ADVERTISEMENT_SYSTEM: u16 = 0x0003;

/// Transform inner-layer vector: point layer.
pub const VECTOR_TRANSFORM_POINT: u16 = 0x0001;
/// Point inner-layer vector: module layer.
pub const VECTOR_POINT_MODULE: u16 = 0x0001;

/// Option bit on the advertisement options byte: set = response, clear = request.
pub const ADVERTISEMENT_RESPONSE_BIT: u8 = 0x80;
/// Option bit on the transform options byte: set = full point set.
pub const TRANSFORM_FULL_POINT_SET_BIT: u8 = 0x80;

/// Maximum module identifiers per module-advertisement datagram.
pub const MAX_MODULE_IDENTIFIERS_PER_DATAGRAM: usize = 344;
/// Maximum address-point-description records per name-advertisement datagram.
pub const MAX_NAME_RECORDS_PER_DATAGRAM: usize = 35;
/// Maximum system number records per system-advertisement datagram.
pub const MAX_SYSTEM_RECORDS_PER_DATAGRAM: usize = 200;

// =======================================================================
// Address-space bounds
// =======================================================================

pub const SYSTEM_NUMBER_MIN: u32 = 1;
pub const SYSTEM_NUMBER_MAX: u32 = 200;
pub const GROUP_NUMBER_MIN: u32 = 1;
pub const GROUP_NUMBER_MAX: u32 = 60_000;
pub const POINT_NUMBER_MIN: u32 = 1;
pub const POINT_NUMBER_MAX: u32 = 4_000_000_000;

pub const PRIORITY_MIN: u8 = 0;
pub const PRIORITY_MAX: u8 = 200;
pub const PRIORITY_DEFAULT: u8 = 100;

// =======================================================================
// Timing
// =======================================================================

/// Initial wait before a producer or consumer begins its periodic work.
pub const INITIAL_WAIT: Duration = Duration::from_secs(12);

/// Producer transform timer interval bounds.
pub const TRANSFORM_INTERVAL_MIN_MS: u64 = 1;
pub const TRANSFORM_INTERVAL_MAX_MS: u64 = 50;

/// Consumer delegate-notification interval bounds.
pub const DELEGATE_INTERVAL_MIN_MS: u64 = 1;
pub const DELEGATE_INTERVAL_MAX_MS: u64 = 10_000;

/// Full point set is forced once this much time has accumulated since the
/// last full set.
pub const FULL_POINT_SET_PERIOD: Duration = Duration::from_millis(2_800);

/// A point stays in deltas for this many ticks after its last change before
/// being omitted from transmission.
pub const CEASE_TRANSMISSION_TICKS: u32 = 4;

/// Module-advertisement housekeeping period (producer and consumer).
pub const MODULE_ADVERTISEMENT_PERIOD: Duration = Duration::from_secs(10);
/// Window after which a declared module identifier is purged if unseen.
pub const MODULE_ADVERTISEMENT_EXPIRY: Duration = Duration::from_secs(30);

/// System-advertisement request period (consumer).
pub const SYSTEM_ADVERTISEMENT_PERIOD: Duration = Duration::from_secs(10);
/// Delay after a system-advertisement request before notifying observers.
pub const SYSTEM_ADVERTISEMENT_NOTIFY_DELAY: Duration = Duration::from_secs(2);

/// Data-loss scan period (both producer and consumer).
pub const DATA_LOSS_SCAN_PERIOD: Duration = Duration::from_secs(1);

/// Maximum uniform-random backoff before replying to an advertisement request.
pub const ADVERTISEMENT_REPLY_BACKOFF_MAX: Duration = Duration::from_millis(5_000);

/// Advertising peer demoted to `Offline` after this much silence.
pub const ADVERTISING_TIMEOUT: Duration = Duration::from_secs(60);
/// Active module-advertisement expectation timeout (2x housekeeping period).
pub const MODULE_ADVERTISEMENT_TIMEOUT: Duration = Duration::from_secs(20);
/// Online producer demoted to `Offline` after this much silence on transforms.
pub const TRANSFORM_TIMEOUT: Duration = Duration::from_millis(7_500);

/// Folio reassembly rolling window length.
pub const TRANSFORM_FOLIO_WINDOW: usize = 5;
/// Folio sequence acceptance window for transforms.
pub const TRANSFORM_FOLIO_SEQUENCE_WINDOW: u32 = 5;
/// Folio sequence acceptance window for advertisements (strictly forward).
pub const ADVERTISEMENT_FOLIO_SEQUENCE_WINDOW: u32 = 0;

/// Default UDP payload budget used when packing datagrams (conservative MTU).
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1_472;

// =======================================================================
// Runtime configuration
// =======================================================================

use crate::address::{ModuleIdentifier, Priority};
use crate::cid::Cid;
use crate::error::ValidationError;
use crate::peer::IpMode;

/// Validated construction settings for a producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub name: String,
    pub cid: Cid,
    pub ip_mode: IpMode,
    pub interface: String,
    pub default_priority: Priority,
    pub interval: Duration,
}

impl ProducerConfig {
    /// `interval` is rejected outside `[1, 50]` ms; `name` is
    /// truncated on a valid Unicode boundary rather than rejected.
    pub fn new(
        name: &str,
        cid: Cid,
        ip_mode: IpMode,
        interface: &str,
        interval: Duration,
    ) -> Result<Self, ValidationError> {
        let interval_ms = interval.as_millis() as u64;
        if !(TRANSFORM_INTERVAL_MIN_MS..=TRANSFORM_INTERVAL_MAX_MS).contains(&interval_ms) {
            return Err(ValidationError::InvalidInterval(interval_ms));
        }
        Ok(Self {
            name: crate::codec::cursor::truncate_to_utf8_boundary(name, NAME_LENGTH).to_string(),
            cid,
            ip_mode,
            interface: interface.to_string(),
            default_priority: Priority::default(),
            interval,
        })
    }
}

/// Validated construction settings for a consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub name: String,
    pub cid: Cid,
    pub ip_mode: IpMode,
    pub interface: String,
    pub module_types: Vec<ModuleIdentifier>,
    pub observed_systems: Vec<u8>,
    pub delegate_interval: Duration,
}

impl ConsumerConfig {
    /// `delegateInterval` is rejected outside `[1, 10000]` ms.
    pub fn new(
        name: &str,
        cid: Cid,
        ip_mode: IpMode,
        interface: &str,
        module_types: Vec<ModuleIdentifier>,
        observed_systems: Vec<u8>,
        delegate_interval: Duration,
    ) -> Result<Self, ValidationError> {
        let interval_ms = delegate_interval.as_millis() as u64;
        if !(DELEGATE_INTERVAL_MIN_MS..=DELEGATE_INTERVAL_MAX_MS).contains(&interval_ms) {
            return Err(ValidationError::InvalidInterval(interval_ms));
        }
        Ok(Self {
            name: crate::codec::cursor::truncate_to_utf8_boundary(name, NAME_LENGTH).to_string(),
            cid,
            ip_mode,
            interface: interface.to_string(),
            module_types,
            observed_systems,
            delegate_interval,
        })
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn producer_config_rejects_interval_out_of_range() {
        let err = ProducerConfig::new(
            "p",
            Cid::new_v4(),
            IpMode::IPv4Only,
            "eth0",
            Duration::from_millis(51),
        );
        assert!(err.is_err());
    }

    #[test]
    fn producer_config_accepts_boundary_interval() {
        let ok = ProducerConfig::new(
            "p",
            Cid::new_v4(),
            IpMode::IPv4Only,
            "eth0",
            Duration::from_millis(1),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn consumer_config_rejects_delegate_interval_out_of_range() {
        let err = ConsumerConfig::new(
            "c",
            Cid::new_v4(),
            IpMode::IPv4Only,
            "eth0",
            vec![],
            vec![1],
            Duration::from_millis(10_001),
        );
        assert!(err.is_err());
    }
}
