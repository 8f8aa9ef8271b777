//! Outermost OTP layer: 79-byte fixed header, packet identifier, source
//! CID, folio/page numbers, component name, and the transform or
//! advertisement body.

use super::advertisement::AdvertisementLayer;
use super::cursor::{Reader, Writer};
use super::transform::TransformLayer;
use super::CodecError;
use crate::cid::Cid;
use crate::config;

/// Offset of the byte following the `length` field; `length` is counted
/// from here through the end of the PDU, footer included.
const LENGTH_COUNT_OFFSET: usize = 16;

/// `OTP layer` fixed header size: identifier(12) + vector(2) + length(2) +
/// footer_options(1) + footer_length(1) + cid(16) + folio(4) + page(2) +
/// last_page(2) + options(1) + reserved(4) + name(32).
pub const OTP_LAYER_HEADER_LEN: usize = config::OTP_LAYER_HEADER_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpBody {
    Transform(TransformLayer),
    Advertisement(AdvertisementLayer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpLayer {
    pub source_cid: Cid,
    pub folio_number: u32,
    pub page: u16,
    pub last_page: u16,
    pub options: u8,
    pub component_name: String,
    pub body: OtpBody,
}

impl OtpLayer {
    pub fn wire_len(&self) -> usize {
        let body_len = match &self.body {
            OtpBody::Transform(t) => t.wire_len(),
            OtpBody::Advertisement(a) => a.wire_len(),
        };
        OTP_LAYER_HEADER_LEN + body_len
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_bytes(&config::PACKET_IDENTIFIER)?;
        let vector = match &self.body {
            OtpBody::Transform(_) => config::VECTOR_OTP_TRANSFORM,
            OtpBody::Advertisement(_) => config::VECTOR_OTP_ADVERTISEMENT,
        };
        w.write_u16(vector)?;
        let length_at = w.offset();
        w.write_u16(0)?; // patched below
        w.write_u8(0)?; // footer-options (reserved, unused)
        w.write_u8(0)?; // footer-length: no footer emitted

        w.write_bytes(self.source_cid.as_bytes())?;
        w.write_u32(self.folio_number)?;
        w.write_u16(self.page)?;
        w.write_u16(self.last_page)?;
        w.write_u8(self.options)?;
        w.write_bytes(&[0u8; 4])?;
        w.write_padded_str(&self.component_name, config::NAME_LENGTH)?;

        match &self.body {
            OtpBody::Transform(t) => t.encode(w)?,
            OtpBody::Advertisement(a) => a.encode(w)?,
        }

        let length = w.offset() - LENGTH_COUNT_OFFSET;
        w.patch_u16(length_at, length as u16)?;
        Ok(())
    }

    /// Decode an OTP layer. A packet-identifier mismatch yields
    /// `Ok(None)` rather than an error: such datagrams are dropped
    /// silently, not treated as a decode failure.
    ///
    /// On success, also returns any non-fatal decode errors encountered
    /// in the body (e.g. individually dropped advertisement records).
    pub fn decode(r: &mut Reader<'_>) -> Result<Option<(Self, Vec<CodecError>)>, CodecError> {
        let identifier = r.read_bytes(12)?;
        if identifier != config::PACKET_IDENTIFIER {
            return Ok(None);
        }
        let vector = r.read_u16()?;
        let length = r.read_u16()? as usize;
        let _footer_options = r.read_u8()?;
        let footer_length = r.read_u8()? as usize;

        let source_cid = Cid::from_bytes(r.read_bytes(16)?.try_into().expect("16-byte slice"));
        let folio_number = r.read_u32()?;
        let page = r.read_u16()?;
        let last_page = r.read_u16()?;
        let options = r.read_u8()?;
        r.skip(4)?;
        let component_name = r.read_padded_str(config::NAME_LENGTH)?;

        if length < footer_length {
            return Err(CodecError::InvalidLength {
                field: "otp.length",
                value: length,
            });
        }
        let body_len = r
            .remaining()
            .checked_sub(footer_length)
            .ok_or(CodecError::InvalidLength {
                field: "otp.footer_length",
                value: footer_length,
            })?;
        let body_bytes = r.read_bytes(body_len)?;
        let mut br = Reader::new(body_bytes);

        let (body, errors) = match vector {
            v if v == config::VECTOR_OTP_TRANSFORM => {
                (OtpBody::Transform(TransformLayer::decode(&mut br)?), Vec::new())
            }
            v if v == config::VECTOR_OTP_ADVERTISEMENT => {
                let (layer, errs) = AdvertisementLayer::decode(&mut br)?;
                (OtpBody::Advertisement(layer), errs)
            }
            other => {
                return Err(CodecError::InvalidVector {
                    field: "otp.vector",
                    value: other,
                })
            }
        };

        r.skip(footer_length)?;

        Ok(Some((
            Self {
                source_cid,
                folio_number,
                page,
                last_page,
                options,
                component_name,
                body,
            },
            errors,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::advertisement::{ModuleAdvertisement, SystemAdvertisement};
    use crate::address::ModuleIdentifier;

    fn sample_layer() -> OtpLayer {
        OtpLayer {
            source_cid: Cid::from_bytes([7; 16]),
            folio_number: 42,
            page: 0,
            last_page: 0,
            options: 0,
            component_name: "fixture producer".to_string(),
            body: OtpBody::Advertisement(AdvertisementLayer::Module(ModuleAdvertisement {
                module_identifiers: vec![ModuleIdentifier::new(0, 1)],
            })),
        }
    }

    #[test]
    fn round_trips_header_fields() {
        let layer = sample_layer();
        let mut buf = vec![0u8; layer.wire_len()];
        layer.encode(&mut Writer::new(&mut buf)).unwrap();
        let (decoded, errs) = OtpLayer::decode(&mut Reader::new(&buf)).unwrap().unwrap();
        assert!(errs.is_empty());
        assert_eq!(decoded, layer);
    }

    #[test]
    fn header_is_79_bytes_before_body() {
        assert_eq!(OTP_LAYER_HEADER_LEN, 79);
    }

    #[test]
    fn mismatched_packet_identifier_drops_silently() {
        let layer = sample_layer();
        let mut buf = vec![0u8; layer.wire_len()];
        layer.encode(&mut Writer::new(&mut buf)).unwrap();
        buf[0] = 0x00; // corrupt the identifier
        let result = OtpLayer::decode(&mut Reader::new(&buf)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn carries_non_fatal_body_errors_through() {
        // A system-advertisement response whose system-number list contains
        // one out-of-range entry (0): the advertisement layer drops it and
        // reports it, and the OTP layer must relay that error up rather than
        // swallow it.
        let layer = OtpLayer {
            source_cid: Cid::from_bytes([7; 16]),
            folio_number: 1,
            page: 0,
            last_page: 0,
            options: 0,
            component_name: "fixture producer".to_string(),
            body: OtpBody::Advertisement(AdvertisementLayer::System(SystemAdvertisement {
                is_response: true,
                systems: vec![1],
            })),
        };
        let mut buf = vec![0u8; layer.wire_len()];
        layer.encode(&mut Writer::new(&mut buf)).unwrap();
        // Corrupt the single encoded system-number byte (last byte of the
        // datagram) from 1 to 0, which is out of range.
        let last = buf.len() - 1;
        assert_eq!(buf[last], 1);
        buf[last] = 0;

        let (decoded, errs) = OtpLayer::decode(&mut Reader::new(&buf)).unwrap().unwrap();
        assert_eq!(errs.len(), 1);
        match decoded.body {
            OtpBody::Advertisement(AdvertisementLayer::System(s)) => assert!(s.systems.is_empty()),
            _ => panic!("expected system advertisement"),
        }
    }
}
