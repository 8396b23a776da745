//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Route put/get/remove to the owning page
//! - Keep a tail page buffer that absorbs appends
//! - Serialize access per page through the lock manager
//! - Rebuild the index from the heap file on startup

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{HeapError, Result};
use crate::index::PageIndex;
use crate::lock::LockManager;
use crate::storage::{Page, PageIter, PageStore, Record};

/// Where a put landed, decided under the tail page's write lock
enum Placement {
    /// Appended to the current tail and persisted
    Appended,
    /// Tail was full; this thread installed a new tail seeded with the record
    Installed(Arc<Page>),
    /// The tail moved underneath us, try again against the new one
    Retry,
}

/// Snapshot of lock pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    /// Pages with a lock bound to them
    pub active_pages: usize,
    /// Locks created by the pool and still alive
    pub pool_live: usize,
    /// Locks bound to a page
    pub pool_in_use: usize,
}

/// The main storage engine
///
/// ## Concurrency Model: Per-Page Read/Write Locks
///
/// - **Writes** (put/remove): exclusive lock of the one page they touch
/// - **Reads** (get): tail page is checked lock-free, other pages under
///   that page's shared lock
/// - **Tail growth**: the new tail is installed with a compare-and-swap;
///   exactly one thread wins, the others retry against the new tail
///
/// No operation holds two page locks at once.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Path of the heap file
    heap_path: PathBuf,

    /// Page file access (positioned I/O)
    store: PageStore,

    /// Key → page number for keys outside the tail buffer
    index: PageIndex,

    /// Page currently receiving appends
    tail: ArcSwap<Page>,

    /// Last page loaded from disk
    last_read: Mutex<Option<Arc<Page>>>,

    /// Per-page locks
    locks: LockManager,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const HEAP_FILENAME: &'static str = "heap.db";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config, create data directory
    /// 2. Open/create the heap file
    /// 3. Rebuild index and tail page from existing pages
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Validate and create data directory
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: Open heap file
        let heap_path = config.data_dir.join(Self::HEAP_FILENAME);
        let store = PageStore::open(&heap_path, config.page_size)?;

        // Step 3: Lock pool
        let locks = LockManager::new(config.lock_pool_capacity)?;

        let engine = Self {
            tail: ArcSwap::from_pointee(Page::new(0, config.page_size)),
            config,
            heap_path,
            store,
            index: PageIndex::new(),
            last_read: Mutex::new(None),
            locks,
        };

        // Step 4: Recover index and tail page
        engine.init()?;

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    /// Rebuild in-memory state from the heap file
    ///
    /// Every live record is indexed (later pages win), and the last stored
    /// page becomes the tail page. An empty file starts at page 0.
    /// Call it only while no other operation is in flight.
    pub fn init(&self) -> Result<()> {
        self.index.clear();
        *self.last_read.lock() = None;

        let mut last: Option<Page> = None;
        let mut live = 0usize;
        for page in self.store.iter() {
            let page = page?;
            for record in page.live_records() {
                self.index.insert(record.key(), page.number());
                live += 1;
            }
            last = Some(page);
        }

        let tail = last.unwrap_or_else(|| Page::new(0, self.config.page_size));
        tracing::info!(
            path = %self.heap_path.display(),
            tail_page = tail.number(),
            live_records = live,
            "heap opened"
        );
        self.tail.store(Arc::new(tail));

        Ok(())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. Tail page buffer (lock-free)
    /// 2. Index → page under its read lock
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        // Step 1: Hot data in the tail page
        if let Some(record) = self.tail.load().find(key) {
            return Ok(Some(record.into_value()));
        }

        // Step 2: Resolve page through the index
        let Some(page_no) = self.index.get(key) else {
            return Ok(None);
        };

        let deadline = self.deadline();
        let lock = self.locks.lock_for_page(page_no, remaining(deadline))?;
        lock.in_read_operation(remaining(deadline), || {
            let page = self.load_page(page_no)?;
            Ok(page.find(key).map(Record::into_value))
        })
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Build the record (fails before any mutation if oversized)
    /// 2. Tombstone any existing live record for the key
    /// 3. Append to the tail page, or install a new tail when it is full
    /// 4. Point the index at the owning page
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let page_size = self.config.page_size;
        let record = Record::new(key, value, Page::capacity(page_size))?;
        let deadline = self.deadline();

        self.remove_before(key, deadline)?;

        loop {
            let tail = self.tail.load_full();
            let lock = self.locks.lock_for_page(tail.number(), remaining(deadline))?;

            let placement = lock.in_write_operation(remaining(deadline), || {
                if !Arc::ptr_eq(&self.tail.load(), &tail) {
                    return Ok(Placement::Retry);
                }

                if tail.append(record.clone()) {
                    self.persist_append(&tail, key)?;
                    self.index.insert(key, tail.number());
                    return Ok(Placement::Appended);
                }

                // Tail is full: flush it and start the next page
                self.store.write(&tail)?;
                let next = tail.number() + 1;
                if next >= self.config.max_page_count {
                    return Err(HeapError::OutOfSpace(format!(
                        "heap is limited to {} pages",
                        self.config.max_page_count
                    )));
                }

                let fresh = Arc::new(Page::with_record(next, page_size, record.clone())?);
                let previous = self.tail.compare_and_swap(&tail, Arc::clone(&fresh));
                if !Arc::ptr_eq(&previous, &tail) {
                    return Ok(Placement::Retry);
                }

                tracing::debug!(page = next, "installed new tail page");
                Ok(Placement::Installed(fresh))
            })?;
            drop(lock);

            match placement {
                Placement::Appended => return Ok(()),
                Placement::Retry => continue,
                Placement::Installed(page) => {
                    // Persist the new tail under its own lock
                    let lock = self.locks.lock_for_page(page.number(), remaining(deadline))?;
                    return lock.in_write_operation(remaining(deadline), || {
                        // A remove may have tombstoned it since the install
                        if !page.contains(key) {
                            return Ok(());
                        }
                        self.persist_append(&page, key)?;
                        self.index.insert(key, page.number());
                        Ok(())
                    });
                }
            }
        }
    }

    /// Remove a key, returning its value if it was present
    ///
    /// The record is tombstoned and its page rewritten before the index
    /// entry is dropped, so a racing `get` sees either the old value or
    /// nothing.
    pub fn remove(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.remove_before(key, self.deadline())
    }

    /// Write the tail page and sync the heap file
    pub fn flush(&self) -> Result<()> {
        let deadline = self.deadline();
        let tail = self.tail.load_full();

        if !tail.is_empty() {
            let lock = self.locks.lock_for_page(tail.number(), remaining(deadline))?;
            lock.in_write_operation(remaining(deadline), || self.store.write(&tail))?;
        }

        self.store.sync()
    }

    /// Close the engine gracefully
    ///
    /// Flushes the tail page and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Lazily iterate stored pages from page 0
    pub fn pages(&self) -> PageIter<'_> {
        self.store.iter()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of the page currently receiving appends
    pub fn tail_page_number(&self) -> u32 {
        self.tail.load().number()
    }

    /// Lock pool usage
    pub fn lock_stats(&self) -> LockStats {
        LockStats {
            active_pages: self.locks.active_pages(),
            pool_live: self.locks.pool_live_count(),
            pool_in_use: self.locks.pool_in_use_count(),
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the heap file path
    pub fn heap_path(&self) -> &Path {
        &self.heap_path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.operation_timeout()
    }

    /// Write `page` after appending `key` to it
    ///
    /// On failure the record is tombstoned again, so a failed put is never
    /// visible to readers.
    fn persist_append(&self, page: &Page, key: &[u8]) -> Result<()> {
        if let Err(e) = self.store.write(page) {
            tracing::warn!(page = page.number(), error = %e, "page write failed, withdrawing record");
            page.mark_deleted(key);
            return Err(e);
        }
        Ok(())
    }

    fn remove_before(&self, key: &[u8], deadline: Instant) -> Result<Option<Bytes>> {
        // Step 1: Resolve owning page (tail buffer first, then index)
        let tail = self.tail.load_full();
        let page_no = if tail.contains(key) {
            tail.number()
        } else {
            match self.index.get(key) {
                Some(page_no) => page_no,
                None => return Ok(None),
            }
        };
        drop(tail);

        // Step 2: Tombstone and persist under the page's write lock
        let lock = self.locks.lock_for_page(page_no, remaining(deadline))?;
        lock.in_write_operation(remaining(deadline), || {
            let page = self.load_page(page_no)?;

            let Some(record) = page.mark_deleted(key) else {
                self.index.remove_if(key, page_no);
                return Ok(None);
            };

            if let Err(e) = self.store.write(&page) {
                self.forget_cached(page_no);
                return Err(e);
            }

            // Step 3: Index entry goes only after the page write
            self.index.remove_if(key, page_no);
            Ok(Some(record.into_value()))
        })
    }

    /// Page `number` as the engine currently sees it
    ///
    /// Must be called under that page's lock. The tail page is served from
    /// memory so its buffer and the file never diverge.
    fn load_page(&self, number: u32) -> Result<Arc<Page>> {
        let tail = self.tail.load_full();
        if tail.number() == number {
            return Ok(tail);
        }

        if let Some(page) = self
            .last_read
            .lock()
            .as_ref()
            .filter(|page| page.number() == number)
        {
            return Ok(Arc::clone(page));
        }

        let page = Arc::new(self.store.read(number)?);
        tracing::trace!(page = number, records = page.record_count(), "loaded page");
        *self.last_read.lock() = Some(Arc::clone(&page));
        Ok(page)
    }

    fn forget_cached(&self, number: u32) {
        let mut cached = self.last_read.lock();
        if cached.as_ref().map(|page| page.number()) == Some(number) {
            *cached = None;
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
