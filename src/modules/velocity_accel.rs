//! Shared wire shape for the two "velocity+acceleration" companion modules:
//! `PositionVelocityAccel` (module 2, depends on `Position`) and
//! `RotationVelocityAccel` (module 4, depends on `Rotation`).

use super::common::{mean_vec3, Vec3};
use crate::address::ModuleIdentifier;
use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

pub const POSITION_VELOCITY_ACCEL_IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 2);
pub const ROTATION_VELOCITY_ACCEL_IDENTIFIER: ModuleIdentifier = ModuleIdentifier::new(0, 4);

/// Velocity and acceleration per axis; the base quantity (position or
/// rotation) lives in the companion module this one depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VelocityAccel {
    pub velocity: Vec3,
    pub acceleration: Vec3,
}

impl VelocityAccel {
    pub const DATA_LENGTH: usize = Vec3::WIRE_LEN * 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::DATA_LENGTH];
        let mut w = Writer::new(&mut buf);
        self.velocity.encode(&mut w).expect("fixed-size buffer");
        self.acceleration.encode(&mut w).expect("fixed-size buffer");
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(data);
        Ok(Self {
            velocity: Vec3::decode(&mut r)?,
            acceleration: Vec3::decode(&mut r)?,
        })
    }

    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }

    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        if values.is_empty() {
            return (None, false);
        }
        let velocities: Vec<Vec3> = values.iter().map(|v| v.velocity).collect();
        let accels: Vec<Vec3> = values.iter().map(|v| v.acceleration).collect();
        (
            Some(Self {
                velocity: mean_vec3(&velocities),
                acceleration: mean_vec3(&accels),
            }),
            false,
        )
    }
}

/// Module 2: depends on `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionVelocityAccel(pub VelocityAccel);

impl PositionVelocityAccel {
    pub const DATA_LENGTH: usize = VelocityAccel::DATA_LENGTH;

    pub fn encode(&self) -> Vec<u8> {
        self.0.encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self(VelocityAccel::decode(data)?))
    }

    pub fn log_description(&self) -> String {
        format!(
            "position velocity/accel vel={:?} accel={:?}",
            self.0.velocity, self.0.acceleration
        )
    }

    pub fn equals(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }

    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        let inner: Vec<VelocityAccel> = values.iter().map(|v| v.0).collect();
        let (merged, excluded) = VelocityAccel::merge(&inner);
        (merged.map(Self), excluded)
    }
}

/// Module 4: depends on `Rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationVelocityAccel(pub VelocityAccel);

impl RotationVelocityAccel {
    pub const DATA_LENGTH: usize = VelocityAccel::DATA_LENGTH;

    pub fn encode(&self) -> Vec<u8> {
        self.0.encode()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Ok(Self(VelocityAccel::decode(data)?))
    }

    pub fn log_description(&self) -> String {
        format!(
            "rotation velocity/accel vel={:?} accel={:?}",
            self.0.velocity, self.0.acceleration
        )
    }

    pub fn equals(&self, other: &Self) -> bool {
        self.0.equals(&other.0)
    }

    pub fn merge(values: &[Self]) -> (Option<Self>, bool) {
        let inner: Vec<VelocityAccel> = values.iter().map(|v| v.0).collect();
        let (merged, excluded) = VelocityAccel::merge(&inner);
        (merged.map(Self), excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_velocity_accel_round_trips() {
        let m = PositionVelocityAccel(VelocityAccel {
            velocity: Vec3 { x: 1, y: 2, z: 3 },
            acceleration: Vec3 { x: -1, y: -2, z: -3 },
        });
        let bytes = m.encode();
        assert_eq!(bytes.len(), PositionVelocityAccel::DATA_LENGTH);
        assert_eq!(PositionVelocityAccel::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn rotation_velocity_accel_round_trips() {
        let m = RotationVelocityAccel(VelocityAccel {
            velocity: Vec3 { x: 4, y: 5, z: 6 },
            acceleration: Vec3::default(),
        });
        let bytes = m.encode();
        assert_eq!(RotationVelocityAccel::decode(&bytes).unwrap(), m);
    }
}
