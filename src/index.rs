//! Index
//!
//! In-memory mapping from key to the page holding its live record.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Key → page number map
///
/// Authoritative only for keys missing from the engine's tail page. May lag
/// the file briefly while a write to the referenced page is in flight.
#[derive(Debug, Default)]
pub struct PageIndex {
    pages: RwLock<HashMap<Vec<u8>, u32>>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page currently recorded for `key`
    pub fn get(&self, key: &[u8]) -> Option<u32> {
        self.pages.read().get(key).copied()
    }

    /// Point `key` at `page`
    pub fn insert(&self, key: &[u8], page: u32) {
        self.pages.write().insert(key.to_vec(), page);
    }

    /// Drop `key` only if it still points at `page`
    ///
    /// A concurrent put may already have moved the key elsewhere.
    pub fn remove_if(&self, key: &[u8], page: u32) -> bool {
        let mut pages = self.pages.write();
        if pages.get(key) == Some(&page) {
            pages.remove(key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }

    pub fn clear(&self) {
        self.pages.write().clear();
    }
}
