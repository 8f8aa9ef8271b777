//! Rotation module: manufacturer 0, module 3.

use super::common::{mean_vec3, Vec3};
use crate::address::ModuleIdentifier;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 3);

/// x/y/z rotation in thousandths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub rotation: Vec3,
}

impl Rotation {
    pub const DATA_LENGTH: usize = Vec3::WIRE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        self.rotation.encode(&mut Writer::new(&mut buf)).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            rotation: Vec3::decode(&mut Reader::new(data))?,
        })
    }

    pub fn log_description(&self) -> String {
        format!(
            "rotation x={} y={} z={} (1/1000 deg)",
            self.rotation.x, self.rotation.y, self.rotation.z
        )
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        if values.is_empty() {
            return (None, false);
        }
        let vectors: Vec<Vec3> = values.iter().map(|v| v.rotation).collect();
        (Some(Self { rotation: mean_vec3(&vectors) }), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let r = Rotation { rotation: Vec3 { x: 90_000, y: 0, z: -1 } };
        let bytes = r.encode();
        assert_eq!(Rotation::decode(&bytes).unwrap(), r);
    }

    #[test]
    fn merge_averages_components() {
        let a = Rotation { rotation: Vec3 { x: 0, y: 0, z: 0 } };
        let b = Rotation { rotation: Vec3 { x: 10, y: 20, z: 30 } };
        let (merged, excluded) = Rotation::merge(&[a, b]);
        assert!(!excluded);
        assert_eq!(merged.unwrap().rotation, Vec3 { x: 5, y: 10, z: 15 });
    }
}
