//! Lock Manager
//!
//! Issues per-page lock handles drawn from a bounded pool of locks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::{HeapError, Result};
use crate::pool::ObjectPool;

use super::handle::{LockEntry, LockHandle};

/// Shared state behind the manager and every handle it issued
pub(super) struct Registry {
    /// Locks not bound to any page
    pub(super) pool: ObjectPool<RwLock<()>>,
    /// Page number → entry for every page with a bound lock
    pub(super) handles: Mutex<HashMap<u32, Arc<LockEntry>>>,
    /// Signalled whenever a handle is dropped
    pub(super) released: Condvar,
}

impl Registry {
    /// Return every reclaimable lock to the pool (map must be locked)
    pub(super) fn reclaim(&self, handles: &mut HashMap<u32, Arc<LockEntry>>) {
        let idle: Vec<u32> = handles
            .iter()
            .filter(|(_, entry)| entry.is_reclaimable())
            .map(|(&page, _)| page)
            .collect();

        for page in idle {
            let Some(entry) = handles.remove(&page) else {
                continue;
            };
            match Arc::try_unwrap(entry) {
                Ok(entry) => {
                    tracing::trace!(page, "returning page lock to pool");
                    self.pool.release(entry.lock);
                }
                // Unreachable while the map is locked, keep the entry anyway
                Err(entry) => {
                    handles.insert(page, entry);
                }
            }
        }
    }
}

/// Hands out one shared lock per page number
///
/// ## Lifecycle of a page lock
/// 1. First `lock_for_page(n)` borrows a lock from the pool and binds it to `n`
/// 2. Later requests for `n` share the same lock while any handle is alive
/// 3. Once every handle is dropped and no operation is active, the next
///    `lock_for_page` call (for any page) sweeps it back into the pool
///
/// ## Concurrency:
/// - `handles`: one Mutex guards lookups, binding, and the reclaim sweep
/// - Waiters for a pooled lock park on `released` with the caller's timeout
#[derive(Clone)]
pub struct LockManager {
    registry: Arc<Registry>,
}

impl LockManager {
    /// Create a manager whose pool holds at most `capacity` locks
    pub fn new(capacity: usize) -> Result<Self> {
        let pool = ObjectPool::new(
            capacity,
            || RwLock::new(()),
            |lock: &RwLock<()>| !lock.is_locked(),
        )?;

        Ok(Self {
            registry: Arc::new(Registry {
                pool,
                handles: Mutex::new(HashMap::new()),
                released: Condvar::new(),
            }),
        })
    }

    /// Get the lock handle for page `page`
    ///
    /// Waits up to `timeout` when every pooled lock is bound to other pages
    /// with operations still outstanding.
    pub fn lock_for_page(&self, page: u32, timeout: Duration) -> Result<LockHandle> {
        let deadline = Instant::now() + timeout;
        let registry = &self.registry;
        let mut handles = registry.handles.lock();

        loop {
            // Piggyback: give idle locks back before looking for ours
            registry.reclaim(&mut handles);

            if let Some(entry) = handles.get(&page) {
                return Ok(LockHandle::new(Arc::clone(entry), Arc::clone(registry)));
            }

            if let Some(lock) = registry.pool.try_borrow() {
                let entry = Arc::new(LockEntry::new(page, lock));
                handles.insert(page, Arc::clone(&entry));
                return Ok(LockHandle::new(entry, Arc::clone(registry)));
            }

            tracing::debug!(page, bound = handles.len(), "lock pool exhausted, waiting");
            if registry
                .released
                .wait_until(&mut handles, deadline)
                .timed_out()
            {
                registry.reclaim(&mut handles);
                if let Some(lock) = registry.pool.try_borrow() {
                    let entry = Arc::new(LockEntry::new(page, lock));
                    handles.insert(page, Arc::clone(&entry));
                    return Ok(LockHandle::new(entry, Arc::clone(registry)));
                }
                tracing::warn!(page, ?timeout, "no page lock available in time");
                return Err(HeapError::OperationTimeout(format!(
                    "no lock for page {} available within {:?}",
                    page, timeout
                )));
            }
        }
    }

    /// Number of pages that currently have a lock bound to them
    pub fn active_pages(&self) -> usize {
        self.registry.handles.lock().len()
    }

    /// Locks created by the pool and not discarded
    pub fn pool_live_count(&self) -> usize {
        self.registry.pool.live_count()
    }

    /// Locks borrowed from the pool (bound to a page)
    pub fn pool_in_use_count(&self) -> usize {
        self.registry.pool.in_use_count()
    }

    pub fn pool_capacity(&self) -> usize {
        self.registry.pool.capacity()
    }
}
