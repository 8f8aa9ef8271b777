//! Scale module: manufacturer 0, module 5.

use super::common::{mean_vec3, Vec3};
use crate::address::ModuleIdentifier;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 5);

/// x/y/z scale factor in thousandths of a unit scale (1000 = 1.0x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub scale: Vec3,
}

impl Scale {
    pub const DATA_LENGTH: usize = Vec3::WIRE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        self.scale.encode(&mut Writer::new(&mut buf)).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            scale: Vec3::decode(&mut Reader::new(data))?,
        })
    }

    pub fn log_description(&self) -> String {
        format!(
            "scale x={} y={} z={} (1/1000)",
            self.scale.x, self.scale.y, self.scale.z
        )
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        if values.is_empty() {
            return (None, false);
        }
        let vectors: Vec<Vec3> = values.iter().map(|v| v.scale).collect();
        (Some(Self { scale: mean_vec3(&vectors) }), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let s = Scale { scale: Vec3 { x: 1000, y: 1000, z: 1000 } };
        let bytes = s.encode();
        assert_eq!(Scale::decode(&bytes).unwrap(), s);
    }
}
