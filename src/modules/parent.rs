//! Parent module: manufacturer 0, module 6. Pinned (alongside `Position`)
//! as the second fully-specified standard module because its `merge` is not
//! a numeric mean: disagreement among equal-priority producers is
//! semantically incompatible and excludes the point.

use crate::address::{Address, ModuleIdentifier};
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 6);

/// Parent address plus a "relative" flag (whether this point's transform is
/// relative to the parent's, rather than absolute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent {
    pub parent: Address,
    pub relative: bool,
}

const WIRE_LEN: usize = 1 + 2 + 4 + 1; // system, group, point, relative flag

impl Parent {
    pub const DATA_LENGTH: usize = WIRE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        let mut w = Writer::new(&mut buf);
        w.write_u8(self.parent.system as u8).expect("fixed-size buffer");
        w.write_u16(self.parent.group as u16).expect("fixed-size buffer");
        w.write_u32(self.parent.point).expect("fixed-size buffer");
        w.write_u8(u8::from(self.relative)).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(data);
        let system = r.read_u8()? as u32;
        let group = r.read_u16()? as u32;
        let point = r.read_u32()?;
        let relative = r.read_u8()? != 0;
        let parent = Address::new(system, group, point).map_err(|e| CodecError::InvalidValue {
            field: "parent.address",
            reason: e.to_string(),
        })?;
        Ok(Self { parent, relative })
    }

    pub fn log_description(&self) -> String {
        format!("parent={} relative={}", self.parent, self.relative)
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Exclude the point whenever equal-priority producers disagree on the
    /// parent (address or relative flag).
    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        match values.split_first() {
            None => (None, false),
            Some((first, rest)) => {
                if rest.iter().all(|v| v == first) {
                    (Some(*first), false)
                } else {
                    (None, true)
                }
            }
        }
    }
}
