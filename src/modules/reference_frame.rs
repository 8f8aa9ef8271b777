//! Reference-frame module: manufacturer 0, module 7. Same
//! exclusion-on-disagreement merge semantics as `Parent`.

use crate::address::{Address, ModuleIdentifier};
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 7);

/// Reference point address plus a one-byte flag (reserved for
/// implementation-specific reference-frame options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFrame {
    pub reference: Address,
    pub flag: bool,
}

const WIRE_LEN: usize = 1 + 2 + 4 + 1;

impl ReferenceFrame {
    pub const DATA_LENGTH: usize = WIRE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        let mut w = Writer::new(&mut buf);
        w.write_u8(self.reference.system as u8).expect("fixed-size buffer");
        w.write_u16(self.reference.group as u16).expect("fixed-size buffer");
        w.write_u32(self.reference.point).expect("fixed-size buffer");
        w.write_u8(u8::from(self.flag)).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(data);
        let system = r.read_u8()? as u32;
        let group = r.read_u16()? as u32;
        let point = r.read_u32()?;
        let flag = r.read_u8()? != 0;
        let reference = Address::new(system, group, point).map_err(|e| CodecError::InvalidValue {
            field: "reference_frame.address",
            reason: e.to_string(),
        })?;
        Ok(Self { reference, flag })
    }

    pub fn log_description(&self) -> String {
        format!("reference_frame={} flag={}", self.reference, self.flag)
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

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
