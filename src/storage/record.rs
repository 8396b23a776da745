//! Record codec
//!
//! Encodes and decodes a single key/value entry plus its 5-byte header.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{HeapError, Result};

use super::{HEADER_SIZE, SENTINEL_SIZE};

/// A key/value entry as stored inside a page
///
/// Wire layout: `[KeySize: u16][ValueSize: u16][Deleted: u8][Key][Value]`,
/// big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Bytes,
    value: Bytes,
    deleted: bool,
}

impl Record {
    /// Build a live record, rejecting it before any mutation if it cannot be
    /// stored in a page of `page_capacity` bytes.
    pub fn new(key: &[u8], value: &[u8], page_capacity: usize) -> Result<Self> {
        let size = HEADER_SIZE + key.len() + value.len();

        if size > page_capacity || key.len() > u16::MAX as usize || value.len() > u16::MAX as usize
        {
            return Err(HeapError::OversizedRecord {
                size,
                capacity: page_capacity,
            });
        }

        // Zero key and value sizes would read back as the end-of-page marker
        if key.is_empty() && value.is_empty() {
            return Err(HeapError::InvalidRecord(
                "key and value cannot both be empty".to_string(),
            ));
        }

        Ok(Self {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
            deleted: false,
        })
    }

    /// Decode the record starting at `offset`
    pub fn decode(buffer: &[u8], offset: usize) -> Result<Self> {
        let header_end = offset + HEADER_SIZE;
        if header_end > buffer.len() {
            return Err(HeapError::Corruption(format!(
                "record header at offset {} runs past page end ({})",
                offset,
                buffer.len()
            )));
        }

        let mut header = &buffer[offset..header_end];
        let key_size = header.get_u16() as usize;
        let value_size = header.get_u16() as usize;
        let deleted = header.get_u8() != 0;

        let value_end = header_end + key_size + value_size;
        if value_end > buffer.len() {
            return Err(HeapError::Corruption(format!(
                "record at offset {} claims {} body bytes, page has {} left",
                offset,
                key_size + value_size,
                buffer.len() - header_end
            )));
        }

        Ok(Self {
            key: Bytes::copy_from_slice(&buffer[header_end..header_end + key_size]),
            value: Bytes::copy_from_slice(&buffer[header_end + key_size..value_end]),
            deleted,
        })
    }

    /// True unless the (up to) 8 bytes at `offset` are all zero.
    ///
    /// Zeroed bytes are the end-of-page sentinel. Fewer than a header's worth
    /// of trailing bytes can never hold a record.
    pub fn exists(buffer: &[u8], offset: usize) -> bool {
        if offset + HEADER_SIZE > buffer.len() {
            return false;
        }
        let end = (offset + SENTINEL_SIZE).min(buffer.len());
        buffer[offset..end].iter().any(|&b| b != 0)
    }

    /// Append the encoded record to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16(self.key.len() as u16);
        buf.put_u16(self.value.len() as u16);
        buf.put_u8(self.deleted as u8);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
    }

    /// Flip the tombstone flag; key and value bytes stay in place
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Encoded size: header + key + value
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.value.len()
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Consume the record, keeping only its value
    pub fn into_value(self) -> Bytes {
        self.value
    }
}
