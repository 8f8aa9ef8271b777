//! Position module: manufacturer 0, module 1 -- the representative module
//! that fully specifies the `Module` contract.

use super::common::{mean_vec3_um_via_mm, Vec3};
use crate::address::ModuleIdentifier;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 1);

/// x/y/z position in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub position: Vec3,
}

impl Position {
    pub const DATA_LENGTH: usize = Vec3::WIRE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        self.position.encode(&mut Writer::new(&mut buf)).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let position = Vec3::decode(&mut Reader::new(data))?;
        Ok(Self { position })
    }

    pub fn log_description(&self) -> String {
        format!(
            "position x={} y={} z={} (um)",
            self.position.x, self.position.y, self.position.z
        )
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    /// Merge by component-wise mean, scaled μm->mm before averaging.
    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        if values.is_empty() {
            return (None, false);
        }
        let vectors: Vec<Vec3> = values.iter().map(|v| v.position).collect();
        (
            Some(Self {
                position: mean_vec3_um_via_mm(&vectors),
            }),
            false,
        )
    }
}
