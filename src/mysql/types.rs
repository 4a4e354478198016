//! Basic data types of the protocol and a cursor to read them.
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_basic_data_types.html>

use crate::error::{Error, Result};

/// Reads protocol primitives from a fully assembled payload.
///
/// Every `get_*` consumes what it reads, every `peek_*` leaves the position
/// untouched. Reads that would go past the end fail with [`Error::Underrun`].
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(Error::Underrun {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Little-endian unsigned integer of `size` bytes (at most 8).
    pub fn peek_fixed(&self, size: usize) -> Result<u64> {
        debug_assert!(size <= 8);
        self.ensure(size)?;

        let mut buffer = [0u8; 8];
        buffer[..size].copy_from_slice(&self.bytes[self.offset..self.offset + size]);
        Ok(u64::from_le_bytes(buffer))
    }

    pub fn get_fixed(&mut self, size: usize) -> Result<u64> {
        let value = self.peek_fixed(size)?;
        self.offset += size;
        Ok(value)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek_fixed(1)? as u8)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.get_fixed(1)? as u8)
    }

    pub fn peek_u16(&self) -> Result<u16> {
        Ok(self.peek_fixed(2)? as u16)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(self.get_fixed(2)? as u16)
    }

    pub fn get_u24(&mut self) -> Result<u32> {
        Ok(self.get_fixed(3)? as u32)
    }

    pub fn peek_u32(&self) -> Result<u32> {
        Ok(self.peek_fixed(4)? as u32)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(self.get_fixed(4)? as u32)
    }

    /// `int<lenenc>`: the first byte is either the value itself or a tag
    /// telling how many bytes follow.
    pub fn get_int_lenenc(&mut self) -> Result<u64> {
        let size = match self.peek_u8()? {
            tag @ 0x00..=0xfa => {
                self.offset += 1;
                return Ok(u64::from(tag));
            }
            0xfc => 2,
            0xfd => 3,
            0xfe => 8,
            tag => {
                return Err(Error::Decode(format!(
                    "unknown length encoded int tag {tag:#04x}"
                )))
            }
        };

        self.ensure(1 + size)?;
        self.offset += 1;
        self.get_fixed(size)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.offset += len;
        Ok(())
    }

    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let bytes = self.bytes;
        Ok(&bytes[self.offset..self.offset + len])
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(len)?;
        self.offset += len;
        Ok(bytes)
    }

    /// `string<NUL>`; the terminator is consumed but not returned.
    pub fn get_bytes_null(&mut self) -> Result<&'a [u8]> {
        let bytes = self.bytes;
        let rest = &bytes[self.offset..];
        let Some(end) = rest.iter().position(|byte| *byte == 0x00) else {
            return Err(Error::Decode("could not find null byte".to_owned()));
        };

        self.offset += end + 1;
        Ok(&rest[..end])
    }

    /// String prefixed by a one byte length.
    pub fn get_bytes_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.peek_u8()? as usize;
        self.ensure(1 + len)?;
        self.offset += 1;
        self.get_bytes(len)
    }

    /// `string<lenenc>`.
    pub fn get_bytes_lenenc(&mut self) -> Result<&'a [u8]> {
        let start = self.offset;
        let len = self.get_int_lenenc()?;
        let len = match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => len,
            _ => {
                let available = self.remaining();
                self.offset = start;
                return Err(Error::Underrun {
                    needed: usize::try_from(len).unwrap_or(usize::MAX),
                    available,
                });
            }
        };
        self.get_bytes(len)
    }

    /// `string<EOF>`.
    pub fn get_rest(&mut self) -> &'a [u8] {
        let bytes = self.bytes;
        let rest = &bytes[self.offset..];
        self.offset = bytes.len();
        rest
    }

    pub fn get_string_null(&mut self) -> Result<String> {
        self.get_bytes_null().map(to_string)
    }

    pub fn get_string_lenenc(&mut self) -> Result<String> {
        self.get_bytes_lenenc().map(to_string)
    }

    pub fn get_string_fixed(&mut self, len: usize) -> Result<String> {
        self.get_bytes(len).map(to_string)
    }

    pub fn get_string_rest(&mut self) -> String {
        to_string(self.get_rest())
    }
}

/// Text on the wire is in the connection charset; anything that is not UTF-8
/// is rendered lossily.
pub fn to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub struct IntLenEnc {}
pub struct StringLenEnc {}

impl IntLenEnc {
    pub fn encode(value: u64) -> Vec<u8> {
        match value {
            0..=0xfa => vec![value as u8],
            0xfb..=0xffff => {
                let mut ret = vec![0xfc];
                ret.extend_from_slice(&value.to_le_bytes()[..2]);
                ret
            }
            0x1_0000..=0xff_ffff => {
                let mut ret = vec![0xfd];
                ret.extend_from_slice(&value.to_le_bytes()[..3]);
                ret
            }
            _ => {
                let mut ret = vec![0xfe];
                ret.extend_from_slice(&value.to_le_bytes());
                ret
            }
        }
    }
}

impl StringLenEnc {
    pub fn encode(value: &[u8]) -> Vec<u8> {
        let mut ret = IntLenEnc::encode(value.len() as u64);
        ret.extend_from_slice(value);
        ret
    }
}
