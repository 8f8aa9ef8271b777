//! ANSI E1.59 Object Transform Protocol (OTP) engine.
//!
//! This crate implements the protocol-level core shared by OTP Producers
//! (emit transform data for addressable points) and Consumers (receive,
//! merge, and observe it): the layered binary codec, the
//! discovery/advertisement state machines, transform-folio reassembly, and
//! priority-aware multi-source merge.
//!
//! Socket binding, multicast membership, and OS scheduling are host
//! concerns; see [`transport`] for the trait boundary a host application
//! implements and hands to a [`producer::Producer`] or
//! [`consumer::Consumer`] at construction.

pub mod address;
pub mod cid;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod folio;
pub mod modules;
pub mod peer;
pub mod point;
pub mod producer;
pub mod transport;

pub use address::{Address, ModuleIdentifier, Priority};
pub use cid::Cid;
pub use config::{ConsumerConfig, ProducerConfig};
pub use consumer::Consumer;
pub use error::{SocketError, StartError, ValidationError};
pub use event::{ConsumerDelegate, ConsumerEvent, ErrorEvent, ProducerDelegate, ProducerEvent};
pub use point::Point;
pub use producer::Producer;
