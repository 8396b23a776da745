//! Object Pool
//!
//! Generic bounded pool of reusable resources.
//!
//! ## Responsibilities
//! - Hand out idle resources, create new ones up to `capacity`
//! - Suspend borrowers while every resource is out (bounded by a timeout)
//! - Validate returned resources; discard the ones that fail validation

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};

use crate::error::{HeapError, Result};

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Validator<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Bounded pool of reusable resources
///
/// ## Concurrency:
/// - `idle`: lock-free queue, each resource sits in it at most once, so no
///   two borrowers ever receive the same instance
/// - `live`: atomic count of created-and-not-discarded resources, raised
///   with a compare-and-swap so it never exceeds `capacity`
/// - `waiters` + `returned`: parking for borrowers while the pool is drained
pub struct ObjectPool<T> {
    idle: ArrayQueue<T>,
    live: AtomicUsize,
    capacity: usize,
    factory: Factory<T>,
    validator: Validator<T>,
    waiters: Mutex<()>,
    returned: Condvar,
}

impl<T> ObjectPool<T> {
    /// Create an empty pool; resources are created lazily on borrow
    pub fn new<F, V>(capacity: usize, factory: F, validator: V) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
        V: Fn(&T) -> bool + Send + Sync + 'static,
    {
        if capacity == 0 {
            return Err(HeapError::Config(
                "object pool capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            idle: ArrayQueue::new(capacity),
            live: AtomicUsize::new(0),
            capacity,
            factory: Box::new(factory),
            validator: Box::new(validator),
            waiters: Mutex::new(()),
            returned: Condvar::new(),
        })
    }

    /// Take a resource without waiting
    ///
    /// Order: an idle resource, else a freshly created one while below
    /// capacity, else `None`.
    pub fn try_borrow(&self) -> Option<T> {
        if let Some(resource) = self.idle.pop() {
            return Some(resource);
        }

        let mut live = self.live.load(Ordering::Acquire);
        while live < self.capacity {
            match self.live.compare_exchange_weak(
                live,
                live + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some((self.factory)()),
                Err(actual) => live = actual,
            }
        }

        // A holder may have returned one while we raced on `live`
        self.idle.pop()
    }

    /// Take a resource, waiting up to `timeout` for one to be returned
    pub fn borrow(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(resource) = self.try_borrow() {
                return Ok(resource);
            }

            let mut guard = self.waiters.lock();
            // Re-check while holding the mutex so a release can't slip past
            if let Some(resource) = self.try_borrow() {
                return Ok(resource);
            }
            if self.returned.wait_until(&mut guard, deadline).timed_out() {
                drop(guard);
                return self.try_borrow().ok_or_else(|| {
                    tracing::warn!(
                        capacity = self.capacity,
                        "object pool exhausted, borrow timed out"
                    );
                    HeapError::OperationTimeout(format!(
                        "no pooled resource available within {:?}",
                        timeout
                    ))
                });
            }
        }
    }

    /// Give a resource back to the pool
    ///
    /// Resources failing validation are dropped, freeing a slot for a new one.
    pub fn release(&self, resource: T) {
        if (self.validator)(&resource) {
            if let Err(rejected) = self.idle.push(resource) {
                drop(rejected);
                self.live.fetch_sub(1, Ordering::AcqRel);
            }
        } else {
            drop(resource);
            self.live.fetch_sub(1, Ordering::AcqRel);
        }

        let _guard = self.waiters.lock();
        self.returned.notify_one();
    }

    /// Resources created and not discarded (idle + borrowed)
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Resources currently borrowed
    pub fn in_use_count(&self) -> usize {
        self.live_count().saturating_sub(self.idle.len())
    }

    /// Resources sitting idle in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.capacity)
            .field("live", &self.live_count())
            .field("idle", &self.idle_count())
            .finish()
    }
}
