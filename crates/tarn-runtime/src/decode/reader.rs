//! Byte cursor over a module binary.
//!
//! Every read is bounds-checked and every failure carries the absolute byte
//! offset at which it happened.

use tarn_core::{Error, Limits, Result, Status, ValueType};

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Absolute offset of `bytes[0]` within the whole binary.
    base: usize,
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the next byte.
    pub(crate) const fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub(crate) fn parse_error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            offset: self.offset(),
            message: message.into(),
        }
    }

    pub(crate) fn validation_error(&self, status: Status, message: impl Into<String>) -> Error {
        Error::Validation {
            status,
            offset: self.offset(),
            message: message.into(),
        }
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.parse_error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn peek_u8(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.parse_error(format!(
                "length {len} exceeds the {} remaining bytes",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Splits off the next `len` bytes as an independent reader.
    pub(crate) fn sub_reader(&mut self, len: usize) -> Result<Self> {
        let base = self.offset();
        let bytes = self.read_bytes(len)?;
        Ok(Self {
            bytes,
            pos: 0,
            base,
        })
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let start = self.offset();
        let mut result: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            if shift == 28 && byte & 0xF0 != 0 {
                return Err(Error::Parse {
                    offset: start,
                    message: "integer representation too long or too large".to_string(),
                });
            }
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Reads a count or length and checks it against the bytes left, since
    /// every counted item occupies at least one byte.
    pub(crate) fn read_len(&mut self) -> Result<usize> {
        let len = self.read_u32()? as usize;
        if len > self.remaining() {
            return Err(self.parse_error(format!("count {len} exceeds section size")));
        }
        Ok(len)
    }

    fn read_signed(&mut self, bits: u32) -> Result<i64> {
        let start = self.offset();
        let mut result: i64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            let last = byte & 0x80 == 0;
            if shift + 7 >= bits {
                // Final byte: unused bits must replicate the sign bit.
                let remaining = bits - shift;
                if !last || !Self::sign_bits_ok(byte, remaining) {
                    return Err(Error::Parse {
                        offset: start,
                        message: "integer representation too long or too large".to_string(),
                    });
                }
            }
            result |= i64::from(byte & 0x7F) << shift;
            shift += 7;
            if last {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1_i64 << shift;
                }
                return Ok(result);
            }
        }
    }

    /// Checks the padding bits of the last byte of a signed LEB128.
    const fn sign_bits_ok(byte: u8, used: u32) -> bool {
        if used >= 7 {
            return true;
        }
        let mask = (0x7F_u8 >> used) << used;
        let sign_set = byte & (1 << (used - 1)) != 0;
        let padding = byte & mask;
        if sign_set { padding == mask } else { padding == 0 }
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_signed(32)? as i32)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        self.read_signed(64)
    }

    /// Reads the signed 33-bit encoding used for block types.
    pub(crate) fn read_s33(&mut self) -> Result<i64> {
        self.read_signed(33)
    }

    pub(crate) fn read_f32_bits(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn read_f64_bits(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn read_name(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Parse {
            offset,
            message: "malformed UTF-8 in name".to_string(),
        })
    }

    pub(crate) fn read_value_type(&mut self) -> Result<ValueType> {
        let byte = self.read_u8()?;
        ValueType::from_byte(byte).ok_or_else(|| {
            Error::Parse {
                offset: self.offset() - 1,
                message: format!("unsupported value type 0x{byte:02x}"),
            }
        })
    }

    pub(crate) fn read_ref_type(&mut self) -> Result<ValueType> {
        let ty = self.read_value_type()?;
        if !ty.is_ref() {
            return Err(self.parse_error(format!("expected a reference type, found {ty}")));
        }
        Ok(ty)
    }

    pub(crate) fn read_limits(&mut self) -> Result<Limits> {
        match self.read_u8()? {
            0x00 => Ok(Limits::new(self.read_u32()?, None)),
            0x01 => {
                let min = self.read_u32()?;
                let max = self.read_u32()?;
                Ok(Limits::new(min, Some(max)))
            }
            flag => Err(self.parse_error(format!("unsupported limits flag 0x{flag:02x}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32_leb() {
        let mut r = Reader::new(&[0xE5, 0x8E, 0x26]);
        assert_eq!(r.read_u32().unwrap(), 624_485);
        assert!(r.is_empty());
    }

    #[test]
    fn test_read_u32_rejects_overlong() {
        let mut r = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x1F]);
        assert!(r.read_u32().unwrap_err().is_parse_error());
        let mut r = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(r.read_u32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_read_signed() {
        let mut r = Reader::new(&[0x7F]);
        assert_eq!(r.read_i32().unwrap(), -1);
        let mut r = Reader::new(&[0xC0, 0xBB, 0x78]);
        assert_eq!(r.read_i32().unwrap(), -123_456);
        let mut r = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x78]);
        assert_eq!(r.read_i32().unwrap(), i32::MIN);
        let mut r = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert_eq!(r.read_i32().unwrap(), i32::MAX);
    }

    #[test]
    fn test_read_signed_rejects_bad_padding() {
        let mut r = Reader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0x4F]);
        assert!(r.read_i32().is_err());
    }

    #[test]
    fn test_unexpected_end_reports_offset() {
        let mut r = Reader::new(&[0x80]);
        match r.read_u32().unwrap_err() {
            Error::Parse { offset, .. } => assert_eq!(offset, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_sub_reader_offsets() {
        let mut r = Reader::new(&[1, 2, 3, 4]);
        r.read_u8().unwrap();
        let mut sub = r.sub_reader(2).unwrap();
        assert_eq!(sub.offset(), 1);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert_eq!(sub.offset(), 2);
        assert_eq!(r.offset(), 3);
    }

    #[test]
    fn test_read_name_utf8() {
        let mut r = Reader::new(&[3, b'a', b'b', b'c']);
        assert_eq!(r.read_name().unwrap(), "abc");
        let mut r = Reader::new(&[2, 0xC3, 0x28]);
        assert!(r.read_name().is_err());
    }

    #[test]
    fn test_read_limits() {
        let mut r = Reader::new(&[0x01, 0x01, 0x02]);
        assert_eq!(r.read_limits().unwrap(), Limits::new(1, Some(2)));
        let mut r = Reader::new(&[0x03, 0x01, 0x02]);
        assert!(r.read_limits().is_err());
    }
}
