//! Standard module set and the module registry.
//!
//! Design note §9: "originally dynamic dispatch via a protocol; implement
//! as a tagged sum of known module variants plus a trait/interface object
//! for user-added modules, stored in a registry keyed by module identifier.
//! Merge and equality are virtual on the variant." [`ModuleValue`] is that
//! tagged sum; [`CustomModule`] is the trait object escape hatch.

mod common;
pub mod parent;
pub mod position;
pub mod reference_frame;
pub mod rotation;
pub mod scale;
pub mod velocity_accel;

use crate::address::ModuleIdentifier;
use crate::codec::CodecError;
use std::collections::HashMap;
use std::fmt;

pub use parent::Parent;
pub use position::Position;
pub use reference_frame::ReferenceFrame;
pub use rotation::Rotation;
pub use scale::Scale;
pub use velocity_accel::{PositionVelocityAccel, RotationVelocityAccel};

/// Trait object contract for a user-added module type not among the seven
/// standard ones. Mirrors the four operations every module carries: encode,
/// decode (via the registry, not this trait), merge, equals.
pub trait CustomModule: fmt::Debug + Send + Sync {
    fn identifier(&self) -> ModuleIdentifier;
    fn data_length(&self) -> usize;
    fn log_description(&self) -> String;
    fn encode(&self) -> Vec<u8>;
    fn equals(&self, other: &dyn CustomModule) -> bool;
    /// Merge this value with others of the same identifier, all present at
    /// the same priority tier.
    fn merge(&self, others: &[&dyn CustomModule]) -> (Option<Box<dyn CustomModule>>, bool);
    fn clone_box(&self) -> Box<dyn CustomModule>;
}

impl Clone for Box<dyn CustomModule> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A decoded module value: one of the seven standard variants, or an
/// opaque [`CustomModule`] registered by the host application.
#[derive(Debug, Clone)]
pub enum ModuleValue {
    Position(Position),
    PositionVelocityAccel(PositionVelocityAccel),
    Rotation(Rotation),
    RotationVelocityAccel(RotationVelocityAccel),
    Scale(Scale),
    Parent(Parent),
    ReferenceFrame(ReferenceFrame),
    Custom(Box<dyn CustomModule>),
}

impl ModuleValue {
    pub fn identifier(&self) -> ModuleIdentifier {
        match self {
            ModuleValue::Position(_) => position::IDENTIFIER,
            ModuleValue::PositionVelocityAccel(_) => {
                velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER
            }
            ModuleValue::Rotation(_) => rotation::IDENTIFIER,
            ModuleValue::RotationVelocityAccel(_) => {
                velocity_accel::ROTATION_VELOCITY_ACCEL_IDENTIFIER
            }
            ModuleValue::Scale(_) => scale::IDENTIFIER,
            ModuleValue::Parent(_) => parent::IDENTIFIER,
            ModuleValue::ReferenceFrame(_) => reference_frame::IDENTIFIER,
            ModuleValue::Custom(m) => m.identifier(),
        }
    }

    pub fn data_length(&self) -> usize {
        match self {
            ModuleValue::Position(_) => Position::DATA_LENGTH,
            ModuleValue::PositionVelocityAccel(_) => PositionVelocityAccel::DATA_LENGTH,
            ModuleValue::Rotation(_) => Rotation::DATA_LENGTH,
            ModuleValue::RotationVelocityAccel(_) => RotationVelocityAccel::DATA_LENGTH,
            ModuleValue::Scale(_) => Scale::DATA_LENGTH,
            ModuleValue::Parent(_) => Parent::DATA_LENGTH,
            ModuleValue::ReferenceFrame(_) => ReferenceFrame::DATA_LENGTH,
            ModuleValue::Custom(m) => m.data_length(),
        }
    }

    pub fn log_description(&self) -> String {
        match self {
            ModuleValue::Position(m) => m.log_description(),
            ModuleValue::PositionVelocityAccel(m) => m.log_description(),
            ModuleValue::Rotation(m) => m.log_description(),
            ModuleValue::RotationVelocityAccel(m) => m.log_description(),
            ModuleValue::Scale(m) => m.log_description(),
            ModuleValue::Parent(m) => m.log_description(),
            ModuleValue::ReferenceFrame(m) => m.log_description(),
            ModuleValue::Custom(m) => m.log_description(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ModuleValue::Position(m) => m.encode(),
            ModuleValue::PositionVelocityAccel(m) => m.encode(),
            ModuleValue::Rotation(m) => m.encode(),
            ModuleValue::RotationVelocityAccel(m) => m.encode(),
            ModuleValue::Scale(m) => m.encode(),
            ModuleValue::Parent(m) => m.encode(),
            ModuleValue::ReferenceFrame(m) => m.encode(),
            ModuleValue::Custom(m) => m.encode(),
        }
    }

    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (ModuleValue::Position(a), ModuleValue::Position(b)) => a.equals(b),
            (ModuleValue::PositionVelocityAccel(a), ModuleValue::PositionVelocityAccel(b)) => {
                a.equals(b)
            }
            (ModuleValue::Rotation(a), ModuleValue::Rotation(b)) => a.equals(b),
            (ModuleValue::RotationVelocityAccel(a), ModuleValue::RotationVelocityAccel(b)) => {
                a.equals(b)
            }
            (ModuleValue::Scale(a), ModuleValue::Scale(b)) => a.equals(b),
            (ModuleValue::Parent(a), ModuleValue::Parent(b)) => a.equals(b),
            (ModuleValue::ReferenceFrame(a), ModuleValue::ReferenceFrame(b)) => a.equals(b),
            (ModuleValue::Custom(a), ModuleValue::Custom(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }

    /// Default-initialized instance of a standard module, used when
    /// implicitly adding associates of a "source" module.
    pub fn default_for(identifier: ModuleIdentifier) -> Option<Self> {
        if identifier == position::IDENTIFIER {
            Some(ModuleValue::Position(Position { position: common::Vec3::default() }))
        } else if identifier == velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER {
            Some(ModuleValue::PositionVelocityAccel(PositionVelocityAccel::default()))
        } else if identifier == rotation::IDENTIFIER {
            Some(ModuleValue::Rotation(Rotation { rotation: common::Vec3::default() }))
        } else if identifier == velocity_accel::ROTATION_VELOCITY_ACCEL_IDENTIFIER {
            Some(ModuleValue::RotationVelocityAccel(RotationVelocityAccel::default()))
        } else if identifier == scale::IDENTIFIER {
            Some(ModuleValue::Scale(Scale { scale: common::Vec3::default() }))
        } else {
            None
        }
    }

    /// Merge a same-identifier group of values present at one priority tier
    ///. All elements must share `values[0]`'s identifier;
    /// mismatched input returns `(None, true)` defensively rather than
    /// panicking.
    pub fn merge(values: &[&Self]) -> (Option<Self>, bool) {
        let Some(first) = values.first() else {
            return (None, false);
        };
        match first {
            ModuleValue::Position(_) => {
                let vs: Vec<Position> = match extract_all(values, |v| match v {
                    ModuleValue::Position(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = Position::merge(&vs);
                (m.map(ModuleValue::Position), excl)
            }
            ModuleValue::PositionVelocityAccel(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::PositionVelocityAccel(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = PositionVelocityAccel::merge(&vs);
                (m.map(ModuleValue::PositionVelocityAccel), excl)
            }
            ModuleValue::Rotation(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::Rotation(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = Rotation::merge(&vs);
                (m.map(ModuleValue::Rotation), excl)
            }
            ModuleValue::RotationVelocityAccel(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::RotationVelocityAccel(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = RotationVelocityAccel::merge(&vs);
                (m.map(ModuleValue::RotationVelocityAccel), excl)
            }
            ModuleValue::Scale(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::Scale(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = Scale::merge(&vs);
                (m.map(ModuleValue::Scale), excl)
            }
            ModuleValue::Parent(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::Parent(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = Parent::merge(&vs);
                (m.map(ModuleValue::Parent), excl)
            }
            ModuleValue::ReferenceFrame(_) => {
                let vs = match extract_all(values, |v| match v {
                    ModuleValue::ReferenceFrame(m) => Some(*m),
                    _ => None,
                }) {
                    Some(vs) => vs,
                    None => return (None, true),
                };
                let (m, excl) = ReferenceFrame::merge(&vs);
                (m.map(ModuleValue::ReferenceFrame), excl)
            }
            ModuleValue::Custom(first_custom) => {
                let mut rest = Vec::with_capacity(values.len().saturating_sub(1));
                for v in &values[1..] {
                    match v {
                        ModuleValue::Custom(c) => rest.push(c.as_ref()),
                        _ => return (None, true),
                    }
                }
                let (merged, excluded) = first_custom.merge(&rest);
                (merged.map(ModuleValue::Custom), excluded)
            }
        }
    }
}

fn extract_all<T>(values: &[&ModuleValue], f: impl Fn(&ModuleValue) -> Option<T>) -> Option<Vec<T>> {
    values.iter().map(|v| f(v)).collect()
}

/// `(dependent, depends_on)` pairs forming the module association table.
const ASSOCIATIONS: &[(ModuleIdentifier, ModuleIdentifier)] = &[
    (velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER, position::IDENTIFIER),
    (velocity_accel::ROTATION_VELOCITY_ACCEL_IDENTIFIER, rotation::IDENTIFIER),
];

/// Modules that depend on `base` and therefore block its removal while
/// present: removing a module fails if any dependent module still exists.
pub fn dependents_of(base: ModuleIdentifier) -> impl Iterator<Item = ModuleIdentifier> + '_ {
    ASSOCIATIONS
        .iter()
        .filter(move |(_, dep_on)| *dep_on == base)
        .map(|(dependent, _)| *dependent)
}

/// Decoder for a registered custom module type.
pub type CustomDecodeFn = fn(&[u8]) -> Result<Box<dyn CustomModule>, CodecError>;

/// Maps module identifiers to decode logic: the seven standard modules are
/// built in, user modules are registered by the host application in a
/// registry keyed by module identifier.
#[derive(Default)]
pub struct ModuleRegistry {
    custom: HashMap<ModuleIdentifier, CustomDecodeFn>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_custom(&mut self, identifier: ModuleIdentifier, decode: CustomDecodeFn) {
        self.custom.insert(identifier, decode);
    }

    /// Decode a module's payload given its identifier. Unknown identifiers
    /// with no registered custom decoder return `Ok(None)`: the caller
    /// skips the module by `dataLength` advance, never surfacing it as an
    /// error.
    pub fn decode(
        &self,
        identifier: ModuleIdentifier,
        data: &[u8],
    ) -> Result<Option<ModuleValue>, CodecError> {
        if identifier == position::IDENTIFIER {
            return Ok(Some(ModuleValue::Position(Position::decode(data)?)));
        }
        if identifier == velocity_accel::POSITION_VELOCITY_ACCEL_IDENTIFIER {
            return Ok(Some(ModuleValue::PositionVelocityAccel(
                PositionVelocityAccel::decode(data)?,
            )));
        }
        if identifier == rotation::IDENTIFIER {
            return Ok(Some(ModuleValue::Rotation(Rotation::decode(data)?)));
        }
        if identifier == velocity_accel::ROTATION_VELOCITY_ACCEL_IDENTIFIER {
            return Ok(Some(ModuleValue::RotationVelocityAccel(
                RotationVelocityAccel::decode(data)?,
            )));
        }
        if identifier == scale::IDENTIFIER {
            return Ok(Some(ModuleValue::Scale(Scale::decode(data)?)));
        }
        if identifier == parent::IDENTIFIER {
            return Ok(Some(ModuleValue::Parent(Parent::decode(data)?)));
        }
        if identifier == reference_frame::IDENTIFIER {
            return Ok(Some(ModuleValue::ReferenceFrame(ReferenceFrame::decode(data)?)));
        }
        if let Some(decode) = self.custom.get(&identifier) {
            return Ok(Some(ModuleValue::Custom(decode(data)?)));
        }
        Ok(None)
    }
}
