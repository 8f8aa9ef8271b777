//! Point layer and module layer framing.

use super::cursor::{Reader, Writer};
use super::CodecError;
use crate::address::ModuleIdentifier;
use crate::config;

/// A single undecoded module payload as it appears on the wire: identifier
/// plus raw bytes, before dispatch through the module registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModule {
    pub identifier: ModuleIdentifier,
    pub data: Vec<u8>,
}

impl RawModule {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_u16(self.identifier.manufacturer_id)?;
        w.write_u16(self.data.len() as u16)?;
        w.write_u16(self.identifier.module_number)?;
        w.write_bytes(&self.data)
    }

    /// Decode one module layer. A module whose declared length exceeds the
    /// remaining buffer is a structural (not value) error and must abort
    /// the enclosing layer's parse.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let manufacturer_id = r.read_u16()?;
        let length = r.read_u16()? as usize;
        let module_number = r.read_u16()?;
        let data = r.read_bytes(length)?.to_vec();
        Ok(Self {
            identifier: ModuleIdentifier::new(manufacturer_id, module_number),
            data,
        })
    }

    /// Wire size of this module layer including its 6-byte header.
    pub fn wire_len(&self) -> usize {
        6 + self.data.len()
    }
}

/// One point's transform data: address fragment (priority/group/point,
/// system comes from the enclosing transform layer), per-point timestamp,
/// and the module layers it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointLayer {
    pub priority: u8,
    pub group: u16,
    pub point: u32,
    pub timestamp_us: u64,
    pub options: u8,
    pub modules: Vec<RawModule>,
}

const POINT_HEADER_LEN: usize = 1 + 2 + 4 + 8 + 1 + 4; // priority,group,point,timestamp,options,reserved
const POINT_VECTOR_LENGTH_LEN: usize = 4; // vector(2) + length(2)

impl PointLayer {
    pub fn wire_len(&self) -> usize {
        POINT_VECTOR_LENGTH_LEN
            + POINT_HEADER_LEN
            + self.modules.iter().map(RawModule::wire_len).sum::<usize>()
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_u16(config::VECTOR_TRANSFORM_POINT)?;
        let length_at = w.offset();
        w.write_u16(0)?; // patched below
        let body_start = w.offset();

        w.write_u8(self.priority)?;
        w.write_u16(self.group)?;
        w.write_u32(self.point)?;
        w.write_u64(self.timestamp_us)?;
        w.write_u8(self.options)?;
        w.write_bytes(&[0u8; 4])?;
        for m in &self.modules {
            m.encode(w)?;
        }

        let body_len = w.offset() - body_start;
        w.patch_u16(length_at, body_len as u16)?;
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let vector = r.read_u16()?;
        if vector != config::VECTOR_TRANSFORM_POINT {
            return Err(CodecError::InvalidVector {
                field: "point.vector",
                value: vector,
            });
        }
        let length = r.read_u16()? as usize;
        if length < POINT_HEADER_LEN {
            return Err(CodecError::InvalidLength {
                field: "point.length",
                value: length,
            });
        }
        let body = r.read_bytes(length)?;
        let mut br = Reader::new(body);

        let priority = br.read_u8()?;
        let group = br.read_u16()?;
        let point = br.read_u32()?;
        let timestamp_us = br.read_u64()?;
        let options = br.read_u8()?;
        br.skip(4)?;

        let mut modules = Vec::new();
        while br.remaining() > 0 {
            match RawModule::decode(&mut br) {
                Ok(m) => modules.push(m),
                // Insufficient data terminates parsing of this point layer,
                // but already-parsed modules are kept.
                Err(CodecError::UnexpectedEnd { .. }) | Err(CodecError::BufferTooSmall { .. }) => {
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            priority,
            group,
            point,
            timestamp_us,
            options,
            modules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_module(id: (u16, u16), data: Vec<u8>) -> RawModule {
        RawModule {
            identifier: ModuleIdentifier::new(id.0, id.1),
            data,
        }
    }

    #[test]
    fn raw_module_round_trips() {
        let m = sample_module((1, 2), vec![0xAA, 0xBB, 0xCC]);
        let mut buf = [0u8; 32];
        let mut w = Writer::new(&mut buf);
        m.encode(&mut w).unwrap();
        let len = w.offset();
        let mut r = Reader::new(&buf[..len]);
        let decoded = RawModule::decode(&mut r).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn point_layer_round_trips_with_multiple_modules() {
        let point = PointLayer {
            priority: 100,
            group: 1,
            point: 1,
            timestamp_us: 123_456,
            options: 0,
            modules: vec![
                sample_module((0, 1), vec![0; 12]),
                sample_module((0, 6), vec![1, 2, 3, 4, 5]),
            ],
        };
        let mut buf = vec![0u8; point.wire_len()];
        let mut w = Writer::new(&mut buf);
        point.encode(&mut w).unwrap();
        let mut r = Reader::new(&buf);
        let decoded = PointLayer::decode(&mut r).unwrap();
        assert_eq!(decoded, point);
    }

    #[test]
    fn point_layer_skips_unknown_module_by_length_advance() {
        // Two modules; a decoder not recognizing the first identifier should
        // still be able to skip it using dataLength and read the second.
        let point = PointLayer {
            priority: 0,
            group: 1,
            point: 1,
            timestamp_us: 0,
            options: 0,
            modules: vec![
                sample_module((0xFFFF, 0xFFFF), vec![9; 4]),
                sample_module((0, 1), vec![1; 12]),
            ],
        };
        let mut buf = vec![0u8; point.wire_len()];
        let mut w = Writer::new(&mut buf);
        point.encode(&mut w).unwrap();
        let mut r = Reader::new(&buf);
        let decoded = PointLayer::decode(&mut r).unwrap();
        assert_eq!(decoded.modules.len(), 2);
        assert_eq!(decoded.modules[1].identifier, ModuleIdentifier::new(0, 1));
    }

    #[test]
    fn point_layer_rejects_wrong_vector() {
        let mut buf = [0u8; 4];
        Writer::new(&mut buf).write_u16(0x9999).unwrap();
        let mut r = Reader::new(&buf);
        assert!(matches!(
            PointLayer::decode(&mut r),
            Err(CodecError::InvalidVector { .. })
        ));
    }
}
