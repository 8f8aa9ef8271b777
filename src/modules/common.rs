//! Shared helpers for the standard module set: three-component vectors and
//! the numeric merge rules -- numeric modules merge by arithmetic mean per
//! component; position modules scale μm->mm before averaging.

use crate::codec::cursor::{Reader, Writer};
use crate::codec::CodecError;

/// Three `i32` wire fields, the shape shared by every standard module that
/// is a bare (x, y, z) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3 {
    pub const WIRE_LEN: usize = 12;

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_i32(self.x)?;
        w.write_i32(self.y)?;
        w.write_i32(self.z)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: r.read_i32()?,
            y: r.read_i32()?,
            z: r.read_i32()?,
        })
    }
}

/// Arithmetic mean of same-precision integer samples, rounded to nearest.
pub fn mean_i32(values: impl Iterator<Item = i32> + Clone) -> i32 {
    let count = values.clone().count();
    if count == 0 {
        return 0;
    }
    let sum: i64 = values.map(i64::from).sum();
    let mean = sum as f64 / count as f64;
    mean.round() as i32
}

pub fn mean_vec3(values: &[Vec3]) -> Vec3 {
    Vec3 {
        x: mean_i32(values.iter().map(|v| v.x)),
        y: mean_i32(values.iter().map(|v| v.y)),
        z: mean_i32(values.iter().map(|v| v.z)),
    }
}

/// Mean of μm-precision samples, computed in mm and rescaled back to μm.
pub fn mean_vec3_um_via_mm(values: &[Vec3]) -> Vec3 {
    let to_mm = |v: i32| f64::from(v) / 1000.0;
    let mean_axis = |axis: fn(&Vec3) -> i32| -> i32 {
        if values.is_empty() {
            return 0;
        }
        let sum_mm: f64 = values.iter().map(|v| to_mm(axis(v))).sum();
        let mean_mm = sum_mm / values.len() as f64;
        (mean_mm * 1000.0).round() as i32
    };
    Vec3 {
        x: mean_axis(|v| v.x),
        y: mean_axis(|v| v.y),
        z: mean_axis(|v| v.z),
    }
}
