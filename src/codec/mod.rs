//! Layered OTP binary codec.
//!
//! Layers nest: OTP layer -> (advertisement layer -> module/name/system
//! advertisement) | (transform layer -> point layer -> module layer+).
//! Every layer is big-endian and begins with a 2-byte vector and a 2-byte
//! length counted from the byte after the length field.

pub mod advertisement;
pub mod cursor;
mod error;
pub mod module_layer;
pub mod otp_layer;
pub mod transform;

pub use error::CodecError;
pub use otp_layer::{OtpBody, OtpLayer};
