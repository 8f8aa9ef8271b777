//! Codec-level error type, named per field.

use std::fmt;

/// Errors raised while decoding (or, for buffer sizing, encoding) a layer.
///
/// Propagation policy: `BufferTooSmall`/`UnexpectedEnd` and
/// `InvalidLength` abort parsing of the enclosing layer; `InvalidValue`
/// surfaces on the error channel but lets sibling PDUs continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough space left in the output buffer while encoding.
    BufferTooSmall { offset: usize, needed: usize },
    /// Not enough bytes left in the input buffer while decoding.
    UnexpectedEnd { offset: usize, needed: usize },
    /// A length field's value is inconsistent with the enclosing buffer.
    InvalidLength { field: &'static str, value: usize },
    /// The 12-byte OTP packet identifier did not match; dropped silently.
    /// Callers should not surface this as an error event, only use it to
    /// short-circuit decode.
    InvalidPacketIdentifier,
    /// An unrecognized vector value for a layer that must name a known kind.
    InvalidVector { field: &'static str, value: u16 },
    /// A value within a known field failed domain validation.
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BufferTooSmall { offset, needed } => {
                write!(f, "buffer too small at offset {offset}: need {needed} more bytes")
            }
            CodecError::UnexpectedEnd { offset, needed } => {
                write!(f, "unexpected end of buffer at offset {offset}: need {needed} more bytes")
            }
            CodecError::InvalidLength { field, value } => {
                write!(f, "invalid length for {field}: {value}")
            }
            CodecError::InvalidPacketIdentifier => write!(f, "invalid OTP packet identifier"),
            CodecError::InvalidVector { field, value } => {
                write!(f, "invalid vector for {field}: {value:#06x}")
            }
            CodecError::InvalidValue { field, reason } => {
                write!(f, "invalid value for {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for CodecError {}
