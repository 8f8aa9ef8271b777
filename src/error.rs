//! Typed error enums for public API validation and transport failures.
//!
//! Mirrors the plain-enum-plus-manual-impl style used throughout this crate's
//! codec errors: no `thiserror`, just `Display` and `std::error::Error`.

use std::fmt;

/// Validation failures for public point/module mutation APIs.
///
/// Returned to the caller; never causes a panic and never mutates component
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `systemNumber` outside `[1, 200]`.
    InvalidSystem(u32),
    /// `groupNumber` outside `[1, 60000]`.
    InvalidGroup(u32),
    /// `pointNumber` outside `[1, 4_000_000_000]`.
    InvalidPoint(u32),
    /// `priority` outside `[0, 200]`.
    InvalidPriority(u32),
    /// `addPoint` called with an address+priority pair that already exists.
    Exists,
    /// `addModule` called with a module identifier already present on the point.
    ModuleExists,
    /// `removeModule` blocked because a dependent module is still present.
    DependentModuleExists,
    /// The requested point/address was not found on this component.
    NotFound,
    /// `interval` or `delegateInterval` outside its configured range, in ms.
    InvalidInterval(u64),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidSystem(v) => write!(f, "system number {v} out of range [1,200]"),
            ValidationError::InvalidGroup(v) => write!(f, "group number {v} out of range [1,60000]"),
            ValidationError::InvalidPoint(v) => {
                write!(f, "point number {v} out of range [1,4000000000]")
            }
            ValidationError::InvalidPriority(v) => write!(f, "priority {v} out of range [0,200]"),
            ValidationError::Exists => write!(f, "address and priority already in use"),
            ValidationError::ModuleExists => write!(f, "module identifier already present on point"),
            ValidationError::DependentModuleExists => {
                write!(f, "cannot remove module: a dependent module still exists")
            }
            ValidationError::NotFound => write!(f, "address not found"),
            ValidationError::InvalidInterval(v) => write!(f, "interval {v}ms out of range"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failures a host `Socket` implementation may report back through `start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    CouldNotBind(String),
    CouldNotEnablePortReuse(String),
    CouldNotJoin(String),
    CouldNotLeave(String),
    CouldNotReceive(String),
    CouldNotAssignMulticastInterface(String),
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::CouldNotBind(s) => write!(f, "could not bind socket: {s}"),
            SocketError::CouldNotEnablePortReuse(s) => write!(f, "could not enable port reuse: {s}"),
            SocketError::CouldNotJoin(s) => write!(f, "could not join multicast group: {s}"),
            SocketError::CouldNotLeave(s) => write!(f, "could not leave multicast group: {s}"),
            SocketError::CouldNotReceive(s) => write!(f, "could not receive: {s}"),
            SocketError::CouldNotAssignMulticastInterface(s) => {
                write!(f, "could not assign multicast interface: {s}")
            }
        }
    }
}

impl std::error::Error for SocketError {}

/// Errors a `start()` call on a producer or consumer engine can return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    Socket(SocketError),
    AlreadyStarted,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::Socket(e) => write!(f, "{e}"),
            StartError::AlreadyStarted => write!(f, "component is already started"),
        }
    }
}

impl std::error::Error for StartError {}

impl From<SocketError> for StartError {
    fn from(e: SocketError) -> Self {
        StartError::Socket(e)
    }
}
