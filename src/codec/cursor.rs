//! Bounds-checked big-endian read/write cursors for OTP wire buffers.
//!
//! OTP is network-byte-order (big-endian) throughout, unlike CDR2-style
//! little-endian wire formats; the cursor shape (macro-generated primitive
//! accessors, explicit offset tracking, no struct punning) follows the same
//! approach a CDR cursor pair would use.

use super::CodecError;

/// Truncate `data` to at most `width` bytes without splitting a UTF-8 code
/// point, so longer strings are truncated on a valid Unicode boundary.
/// Shared by the wire writer and by `Point` name construction, so both
/// apply the identical rule.
pub fn truncate_to_utf8_boundary(data: &str, width: usize) -> &str {
    if data.len() <= width {
        return data;
    }
    let mut cut = width;
    while cut > 0 && !data.is_char_boundary(cut) {
        cut -= 1;
    }
    &data[..cut]
}

macro_rules! impl_write_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> Result<(), CodecError> {
            if self.offset + $size > self.buffer.len() {
                return Err(CodecError::BufferTooSmall {
                    offset: self.offset,
                    needed: $size,
                });
            }
            let bytes = value.to_be_bytes();
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

macro_rules! impl_read_be {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type, CodecError> {
            if self.offset + $size > self.buffer.len() {
                return Err(CodecError::UnexpectedEnd {
                    offset: self.offset,
                    needed: $size,
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_be_bytes(bytes))
        }
    };
}

/// Mutable cursor for writing a big-endian OTP buffer.
pub struct Writer<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write_be!(write_u8, u8, 1);
    impl_write_be!(write_u16, u16, 2);
    impl_write_be!(write_u32, u32, 4);
    impl_write_be!(write_u64, u64, 8);

    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.write_u32(value as u32)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(CodecError::BufferTooSmall {
                offset: self.offset,
                needed: data.len(),
            });
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Write `data`, NUL-padded or truncated (on a valid UTF-8 boundary
    /// before truncation) to exactly `width` bytes.
    pub fn write_padded_str(&mut self, data: &str, width: usize) -> Result<(), CodecError> {
        let truncated = truncate_to_utf8_boundary(data, width);
        self.write_bytes(truncated.as_bytes())?;
        for _ in truncated.len()..width {
            self.write_u8(0)?;
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    /// Overwrite an already-written `u16` field at a fixed offset (used to
    /// patch length/page fields once a PDU's final size is known).
    pub fn patch_u16(&mut self, at: usize, value: u16) -> Result<(), CodecError> {
        if at + 2 > self.buffer.len() {
            return Err(CodecError::BufferTooSmall {
                offset: at,
                needed: 2,
            });
        }
        self.buffer[at..at + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

/// Immutable cursor for reading a big-endian OTP buffer.
pub struct Reader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_be!(read_u8, u8, 1);
    impl_read_be!(read_u16, u16, 2);
    impl_read_be!(read_u32, u32, 4);
    impl_read_be!(read_u64, u64, 8);

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.offset + len > self.buffer.len() {
            return Err(CodecError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Read a fixed-width NUL-padded UTF-8 field, trimming trailing NULs.
    pub fn read_padded_str(&mut self, width: usize) -> Result<String, CodecError> {
        let raw = self.read_bytes(width)?;
        let trimmed_len = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        std::str::from_utf8(&raw[..trimmed_len])
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidValue {
                field: "name",
                reason: "not valid UTF-8".into(),
            })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        if self.offset + len > self.buffer.len() {
            return Err(CodecError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
            });
        }
        self.offset += len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut buf = [0u8; 32];
        {
            let mut w = Writer::new(&mut buf);
            w.write_u8(0xAB).unwrap();
            w.write_u16(0x1234).unwrap();
            w.write_u32(0xDEAD_BEEF).unwrap();
            w.write_i32(-1).unwrap();
        }
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_i32().unwrap(), -1);
    }

    #[test]
    fn big_endian_byte_order() {
        let mut buf = [0u8; 2];
        Writer::new(&mut buf).write_u16(0x0102).unwrap();
        assert_eq!(buf, [0x01, 0x02]);
    }

    #[test]
    fn write_detects_buffer_too_small() {
        let mut buf = [0u8; 1];
        let mut w = Writer::new(&mut buf);
        assert!(w.write_u16(1).is_err());
    }

    #[test]
    fn read_detects_unexpected_end() {
        let buf = [0u8; 1];
        let mut r = Reader::new(&buf);
        assert!(r.read_u16().is_err());
    }

    #[test]
    fn padded_str_round_trips_and_trims_nuls() {
        let mut buf = [0u8; 32];
        Writer::new(&mut buf).write_padded_str("hello", 32).unwrap();
        assert_eq!(&buf[5..], [0u8; 27]);
        let decoded = Reader::new(&buf).read_padded_str(32).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn padded_str_truncates_on_char_boundary() {
        // "é" is 2 bytes in UTF-8; ensure truncation never splits it.
        let long = "a".repeat(30) + "é" + "x";
        let mut buf = [0u8; 32];
        Writer::new(&mut buf).write_padded_str(&long, 32).unwrap();
        let decoded = Reader::new(&buf).read_padded_str(32).unwrap();
        assert!(long.starts_with(&decoded));
        assert!(decoded.len() <= 32);
    }

    #[test]
    fn truncate_to_utf8_boundary_never_splits_a_code_point() {
        let long = "a".repeat(30) + "é" + "x";
        let truncated = truncate_to_utf8_boundary(&long, 32);
        assert!(long.starts_with(truncated));
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }

    #[test]
    fn patch_u16_overwrites_fixed_offset() {
        let mut buf = [0u8; 4];
        let mut w = Writer::new(&mut buf);
        w.write_u16(0).unwrap();
        w.write_u16(0xFFFF).unwrap();
        w.patch_u16(0, 0x1234).unwrap();
        assert_eq!(buf, [0x12, 0x34, 0xFF, 0xFF]);
    }
}
