//! Lock Handle
//!
//! A pooled read-write lock bound to one page number.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{HeapError, Result};

use super::manager::Registry;

/// Registry entry: the pooled lock plus its bookkeeping
pub(super) struct LockEntry {
    pub(super) page: u32,
    pub(super) lock: RwLock<()>,
    active: AtomicUsize,
    used: AtomicBool,
}

impl LockEntry {
    pub(super) fn new(page: u32, lock: RwLock<()>) -> Self {
        Self {
            page,
            lock,
            active: AtomicUsize::new(0),
            used: AtomicBool::new(false),
        }
    }

    /// Reclaimable once used, idle, and referenced only by the registry.
    ///
    /// Called with the registry map locked. Fresh references are only handed
    /// out under that lock and clones need an existing reference, so a strong
    /// count of 1 cannot grow behind us.
    pub(super) fn is_reclaimable(self: &Arc<Self>) -> bool {
        self.used.load(Ordering::Acquire)
            && self.active.load(Ordering::Acquire) == 0
            && Arc::strong_count(self) == 1
    }

    fn begin(&self) -> ActiveOperation<'_> {
        self.used.store(true, Ordering::Release);
        self.active.fetch_add(1, Ordering::AcqRel);
        ActiveOperation { entry: self }
    }
}

/// Counts one in-flight operation; decrements on every exit path
struct ActiveOperation<'a> {
    entry: &'a LockEntry,
}

impl Drop for ActiveOperation<'_> {
    fn drop(&mut self) {
        self.entry.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to the lock of one page, see [`LockManager::lock_for_page`]
///
/// All handles for the same page share one underlying lock while any of them
/// is alive. Dropping the last one makes the lock eligible for return to the
/// pool.
///
/// [`LockManager::lock_for_page`]: super::LockManager::lock_for_page
pub struct LockHandle {
    entry: Option<Arc<LockEntry>>,
    registry: Arc<Registry>,
}

impl LockHandle {
    pub(super) fn new(entry: Arc<LockEntry>, registry: Arc<Registry>) -> Self {
        Self {
            entry: Some(entry),
            registry,
        }
    }

    /// Page this handle locks
    pub fn page(&self) -> u32 {
        self.entry().page
    }

    /// Run `op` holding the shared (read) lock
    ///
    /// Fails with `OperationTimeout` if the lock isn't acquired within
    /// `timeout`. The lock is released however `op` exits.
    pub fn in_read_operation<R>(
        &self,
        timeout: Duration,
        op: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let entry = self.entry();
        let _active = entry.begin();
        let _guard = entry
            .lock
            .try_read_for(timeout)
            .ok_or_else(|| timed_out("read", entry.page, timeout))?;
        op()
    }

    /// Run `op` holding the exclusive (write) lock
    pub fn in_write_operation<R>(
        &self,
        timeout: Duration,
        op: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let entry = self.entry();
        let _active = entry.begin();
        let _guard = entry
            .lock
            .try_write_for(timeout)
            .ok_or_else(|| timed_out("write", entry.page, timeout))?;
        op()
    }

    /// Operations currently inside (or waiting on) this page's lock
    pub fn active_operations(&self) -> usize {
        self.entry().active.load(Ordering::Acquire)
    }

    fn entry(&self) -> &LockEntry {
        // Only `drop` takes the entry out
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("lock handle used after drop"),
        }
    }
}

impl Clone for LockHandle {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        // Release the reference under the map lock, then wake anyone waiting
        // for a lock to come back to the pool
        let _handles = self.registry.handles.lock();
        drop(self.entry.take());
        self.registry.released.notify_all();
    }
}

fn timed_out(kind: &str, page: u32, timeout: Duration) -> HeapError {
    tracing::warn!(page, ?timeout, "{} lock not acquired in time", kind);
    HeapError::OperationTimeout(format!(
        "{} lock on page {} not acquired within {:?}",
        kind, page, timeout
    ))
}
