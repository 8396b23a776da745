//! Page
//!
//! Append-mostly container of records inside one fixed-size block.

use bytes::BytesMut;
use parking_lot::RwLock;

use crate::error::{HeapError, Result};

use super::Record;

/// One fixed-size page of records
///
/// ## Concurrency:
/// - `state`: RwLock so an append and a serialization never interleave
///   (a writer of page bytes never observes a torn append)
/// - All methods take `&self`; a page is shared as `Arc<Page>`
#[derive(Debug)]
pub struct Page {
    /// Fixed on-disk slot
    number: u32,
    /// Page size in bytes
    max_size: usize,
    state: RwLock<PageState>,
}

#[derive(Debug, Default)]
struct PageState {
    /// Records in append order
    records: Vec<Record>,
    /// Sum of encoded record sizes
    used: usize,
}

impl Page {
    /// Create an empty page
    pub fn new(number: u32, max_size: usize) -> Self {
        Self {
            number,
            max_size,
            state: RwLock::new(PageState::default()),
        }
    }

    /// Create a page seeded with one record
    pub fn with_record(number: u32, max_size: usize, record: Record) -> Result<Self> {
        let page = Self::new(number, max_size);
        let size = record.size();
        if !page.append(record) {
            return Err(HeapError::OversizedRecord {
                size,
                capacity: Self::capacity(max_size),
            });
        }
        Ok(page)
    }

    /// Largest record a page of `max_size` bytes can hold.
    ///
    /// One byte is always left over so the end-of-page marker fits.
    pub fn capacity(max_size: usize) -> usize {
        max_size.saturating_sub(1)
    }

    /// Append a record; returns false (page untouched) if it would not fit
    pub fn append(&self, record: Record) -> bool {
        let mut state = self.state.write();
        if state.used + record.size() >= self.max_size {
            return false;
        }
        state.used += record.size();
        state.records.push(record);
        true
    }

    /// Most recently appended live record for `key`
    pub fn find(&self, key: &[u8]) -> Option<Record> {
        self.state
            .read()
            .records
            .iter()
            .rev()
            .find(|r| !r.is_deleted() && r.key() == key)
            .cloned()
    }

    /// True if a live record for `key` exists
    pub fn contains(&self, key: &[u8]) -> bool {
        self.state
            .read()
            .records
            .iter()
            .any(|r| !r.is_deleted() && r.key() == key)
    }

    /// Tombstone the live record for `key`, returning it as it was before
    pub fn mark_deleted(&self, key: &[u8]) -> Option<Record> {
        let mut state = self.state.write();
        let record = state
            .records
            .iter_mut()
            .rev()
            .find(|r| !r.is_deleted() && r.key() == key)?;

        let removed = record.clone();
        record.mark_deleted();
        Some(removed)
    }

    /// Snapshot of all live records in append order
    pub fn live_records(&self) -> Vec<Record> {
        self.state
            .read()
            .records
            .iter()
            .filter(|r| !r.is_deleted())
            .cloned()
            .collect()
    }

    /// Snapshot of every record, tombstones included
    pub fn records(&self) -> Vec<Record> {
        self.state.read().records.clone()
    }

    /// Encode the page into exactly `max_size` bytes.
    ///
    /// Records are written back-to-back in append order, the rest is zero.
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.max_size);
        {
            let state = self.state.read();
            for record in &state.records {
                record.encode_into(&mut buf);
            }
        }
        buf.resize(self.max_size, 0);
        buf
    }

    /// Decode a page, reading records until the end-of-page marker
    pub fn deserialize(number: u32, max_size: usize, buffer: &[u8]) -> Result<Self> {
        let mut state = PageState::default();
        let mut offset = 0;

        while Record::exists(buffer, offset) {
            let record = Record::decode(buffer, offset)?;
            offset += record.size();
            state.used += record.size();
            state.records.push(record);
        }

        if state.used >= max_size {
            return Err(HeapError::Corruption(format!(
                "page {} holds {} bytes of records, limit is {}",
                number,
                state.used,
                max_size - 1
            )));
        }

        Ok(Self {
            number,
            max_size,
            state: RwLock::new(state),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Bytes taken by records (live and tombstoned)
    pub fn used(&self) -> usize {
        self.state.read().used
    }

    /// Number of records, tombstones included
    pub fn record_count(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}
