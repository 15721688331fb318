//! Bounds-checked little-endian reader over a song buffer

use crate::error::{Error, Result};

/// Absolute-offset reads over raw song data
///
/// Every read is bounds-checked and reports [`Error::Truncated`] instead of
/// panicking.
pub struct ByteReader<'a> {
    data: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether `signature` appears at `offset`
    pub fn has_signature(&self, offset: usize, signature: &[u8]) -> bool {
        self.data
            .get(offset..offset + signature.len())
            .is_some_and(|s| s == signature)
    }

    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.data.get(offset..offset + len).ok_or(Error::Truncated {
            offset,
            needed: len,
        })
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes_at(offset, 1)?[0])
    }

    pub fn i8_at(&self, offset: usize) -> Result<i8> {
        Ok(self.u8_at(offset)? as i8)
    }

    pub fn u16_le_at(&self, offset: usize) -> Result<u16> {
        let b = self.bytes_at(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le_at(&self, offset: usize) -> Result<u32> {
        let b = self.bytes_at(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
