//! Component identifier (CID): a 128-bit RFC 4122 UUID, the stable key in
//! every peer table.

use std::fmt;
use uuid::Uuid;

/// Persistent per-component identifier. No persistence layout is required
/// of this crate; callers generate one with [`Cid::new_v4`] on first run
/// and persist it themselves across restarts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(Uuid);

impl Cid {
    /// Generate a fresh random CID.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing 128-bit value, e.g. one a caller persisted.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let cid = Cid::new_v4();
        let bytes = cid.as_bytes();
        assert_eq!(Cid::from_bytes(bytes), cid);
    }
}
