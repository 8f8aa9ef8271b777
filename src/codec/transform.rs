//! Transform layer: one system's set of sampled points for one folio page.

use super::cursor::{Reader, Writer};
use super::module_layer::PointLayer;
use super::CodecError;
use crate::config;

const TRANSFORM_HEADER_LEN: usize = 1 + 8 + 1 + 4; // system, timestamp, options, reserved
const TRANSFORM_VECTOR_LENGTH_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformLayer {
    pub system: u8,
    pub timestamp_us: u64,
    pub full_point_set: bool,
    pub points: Vec<PointLayer>,
}

impl TransformLayer {
    pub fn wire_len(&self) -> usize {
        TRANSFORM_VECTOR_LENGTH_LEN
            + TRANSFORM_HEADER_LEN
            + self.points.iter().map(PointLayer::wire_len).sum::<usize>()
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_u16(config::VECTOR_TRANSFORM_POINT)?;
        let length_at = w.offset();
        w.write_u16(0)?;
        let body_start = w.offset();

        w.write_u8(self.system)?;
        w.write_u64(self.timestamp_us)?;
        let options = if self.full_point_set {
            config::TRANSFORM_FULL_POINT_SET_BIT
        } else {
            0
        };
        w.write_u8(options)?;
        w.write_bytes(&[0u8; 4])?;
        for p in &self.points {
            p.encode(w)?;
        }

        let body_len = w.offset() - body_start;
        w.patch_u16(length_at, body_len as u16)?;
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let vector = r.read_u16()?;
        if vector != config::VECTOR_TRANSFORM_POINT {
            return Err(CodecError::InvalidVector {
                field: "transform.vector",
                value: vector,
            });
        }
        let length = r.read_u16()? as usize;
        if length < TRANSFORM_HEADER_LEN {
            return Err(CodecError::InvalidLength {
                field: "transform.length",
                value: length,
            });
        }
        let body = r.read_bytes(length)?;
        let mut br = Reader::new(body);

        let system = br.read_u8()?;
        let timestamp_us = br.read_u64()?;
        let options = br.read_u8()?;
        br.skip(4)?;
        let full_point_set = options & config::TRANSFORM_FULL_POINT_SET_BIT != 0;

        let mut points = Vec::new();
        while br.remaining() > 0 {
            match PointLayer::decode(&mut br) {
                Ok(p) => points.push(p),
                Err(CodecError::UnexpectedEnd { .. }) | Err(CodecError::BufferTooSmall { .. }) => {
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            system,
            timestamp_us,
            full_point_set,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ModuleIdentifier;
    use crate::codec::module_layer::RawModule;

    fn sample_point(point: u32) -> PointLayer {
        PointLayer {
            priority: 100,
            group: 1,
            point,
            timestamp_us: 42,
            options: 0,
            modules: vec![RawModule {
                identifier: ModuleIdentifier::new(0, 1),
                data: vec![0; 12],
            }],
        }
    }

    #[test]
    fn round_trips_full_point_set_flag() {
        let t = TransformLayer {
            system: 5,
            timestamp_us: 1000,
            full_point_set: true,
            points: vec![sample_point(1), sample_point(2)],
        };
        let mut buf = vec![0u8; t.wire_len()];
        let mut w = Writer::new(&mut buf);
        t.encode(&mut w).unwrap();
        let mut r = Reader::new(&buf);
        let decoded = TransformLayer::decode(&mut r).unwrap();
        assert_eq!(decoded, t);
        assert!(decoded.full_point_set);
    }

    #[test]
    fn round_trips_delta_flag_clear() {
        let t = TransformLayer {
            system: 1,
            timestamp_us: 0,
            full_point_set: false,
            points: vec![],
        };
        let mut buf = vec![0u8; t.wire_len()];
        let mut w = Writer::new(&mut buf);
        t.encode(&mut w).unwrap();
        let mut r = Reader::new(&buf);
        let decoded = TransformLayer::decode(&mut r).unwrap();
        assert!(!decoded.full_point_set);
    }
}
