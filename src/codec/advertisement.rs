//! Advertisement layer and its three inner layers: module, name, system.

use super::cursor::{Reader, Writer};
use super::CodecError;
use crate::address::{Address, ModuleIdentifier};
use crate::config;

/// One producer-advertised point name record (system/group/point + name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPointDescription {
    pub system: u8,
    pub group: u16,
    pub point: u32,
    pub name: String,
}

const APD_WIRE_LEN: usize = 1 + 2 + 4 + config::NAME_LENGTH;

impl AddressPointDescription {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.write_u8(self.system)?;
        w.write_u16(self.group)?;
        w.write_u32(self.point)?;
        w.write_padded_str(&self.name, config::NAME_LENGTH)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let system = r.read_u8()?;
        let group = r.read_u16()?;
        let point = r.read_u32()?;
        let name = r.read_padded_str(config::NAME_LENGTH)?;
        Ok(Self {
            system,
            group,
            point,
            name,
        })
    }

    /// Validate the record's address components are in-range. Callers drop
    /// invalid records individually and surface an error.
    pub fn validate(&self) -> Result<Address, CodecError> {
        Address::new(self.system as u32, self.group as u32, self.point).map_err(|e| {
            CodecError::InvalidValue {
                field: "name_advertisement.record",
                reason: e.to_string(),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleAdvertisement {
    pub module_identifiers: Vec<ModuleIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameAdvertisement {
    pub is_response: bool,
    pub records: Vec<AddressPointDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemAdvertisement {
    pub is_response: bool,
    pub systems: Vec<u8>,
}

/// The three kinds of advertisement content, after the shared
/// vector+length+reserved inner-layer framing is stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvertisementLayer {
    Module(ModuleAdvertisement),
    Name(NameAdvertisement),
    System(SystemAdvertisement),
}

const INNER_HEADER_LEN: usize = 4; // 4 reserved bytes after vector+length
const INNER_VECTOR_LENGTH_LEN: usize = 4;

impl AdvertisementLayer {
    pub fn wire_len(&self) -> usize {
        let body_len = match self {
            AdvertisementLayer::Module(m) => m.module_identifiers.len() * 4,
            AdvertisementLayer::Name(n) => 1 + n.records.len() * APD_WIRE_LEN,
            AdvertisementLayer::System(s) => 1 + s.systems.len(),
        };
        INNER_VECTOR_LENGTH_LEN + INNER_HEADER_LEN + body_len
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        let vector = match self {
            AdvertisementLayer::Module(_) => config::VECTOR_ADVERTISEMENT_MODULE,
            AdvertisementLayer::Name(_) => config::VECTOR_ADVERTISEMENT_NAME,
            AdvertisementLayer::System(_) => config::VECTOR_ADVERTISEMENT_SYSTEM,
        };
        w.write_u16(vector)?;
        let length_at = w.offset();
        w.write_u16(0)?;
        let body_start = w.offset();
        w.write_bytes(&[0u8; 4])?; // reserved

        match self {
            AdvertisementLayer::Module(m) => {
                for id in &m.module_identifiers {
                    w.write_u16(id.manufacturer_id)?;
                    w.write_u16(id.module_number)?;
                }
            }
            AdvertisementLayer::Name(n) => {
                let options = if n.is_response {
                    config::ADVERTISEMENT_RESPONSE_BIT
                } else {
                    0
                };
                w.write_u8(options)?;
                if n.is_response {
                    for rec in &n.records {
                        rec.encode(w)?;
                    }
                }
            }
            AdvertisementLayer::System(s) => {
                let options = if s.is_response {
                    config::ADVERTISEMENT_RESPONSE_BIT
                } else {
                    0
                };
                w.write_u8(options)?;
                if s.is_response {
                    for &sys in &s.systems {
                        w.write_u8(sys)?;
                    }
                }
            }
        }

        let body_len = w.offset() - body_start;
        w.patch_u16(length_at, body_len as u16)?;
        Ok(())
    }

    /// Decode the advertisement layer. Dropped/invalid individual records
    /// are returned alongside: system-advertisement
    /// records with an out-of-range system number, or name-advertisement
    /// records with an invalid address.
    pub fn decode(r: &mut Reader<'_>) -> Result<(Self, Vec<CodecError>), CodecError> {
        let vector = r.read_u16()?;
        let length = r.read_u16()? as usize;
        let body = r.read_bytes(length)?;
        let mut br = Reader::new(body);
        if br.remaining() < INNER_HEADER_LEN {
            return Err(CodecError::InvalidLength {
                field: "advertisement.length",
                value: length,
            });
        }
        br.skip(INNER_HEADER_LEN)?;

        let mut errors = Vec::new();
        let layer = match vector {
            v if v == config::VECTOR_ADVERTISEMENT_MODULE => {
                let mut ids = Vec::new();
                while br.remaining() >= 4 {
                    let manufacturer_id = br.read_u16()?;
                    let module_number = br.read_u16()?;
                    ids.push(ModuleIdentifier::new(manufacturer_id, module_number));
                }
                AdvertisementLayer::Module(ModuleAdvertisement {
                    module_identifiers: ids,
                })
            }
            v if v == config::VECTOR_ADVERTISEMENT_NAME => {
                let options = br.read_u8()?;
                let is_response = options & config::ADVERTISEMENT_RESPONSE_BIT != 0;
                let mut records = Vec::new();
                if is_response {
                    while br.remaining() >= APD_WIRE_LEN {
                        let rec = AddressPointDescription::decode(&mut br)?;
                        if let Err(e) = rec.validate() {
                            errors.push(e);
                            continue;
                        }
                        records.push(rec);
                    }
                }
                AdvertisementLayer::Name(NameAdvertisement {
                    is_response,
                    records,
                })
            }
            v if v == config::VECTOR_ADVERTISEMENT_SYSTEM => {
                let options = br.read_u8()?;
                let is_response = options & config::ADVERTISEMENT_RESPONSE_BIT != 0;
                let mut systems = Vec::new();
                if is_response {
                    while br.remaining() >= 1 {
                        let sys = br.read_u8()?;
                        if Address::new(sys as u32, 1, 1).is_err() {
                            errors.push(CodecError::InvalidValue {
                                field: "system_advertisement.record",
                                reason: format!("system number {sys} out of range"),
                            });
                            continue;
                        }
                        systems.push(sys);
                    }
                }
                AdvertisementLayer::System(SystemAdvertisement {
                    is_response,
                    systems,
                })
            }
            other => {
                return Err(CodecError::InvalidVector {
                    field: "advertisement.vector",
                    value: other,
                })
            }
        };
        Ok((layer, errors))
    }
}
