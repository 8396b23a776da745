//! Tests for LockManager
//!
//! These tests verify:
//! - One shared lock per page while handles are alive
//! - Readers shared, writers exclusive, bounded by timeouts
//! - Locks released on error and panic paths
//! - Idle locks swept back into the pool on the next request

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use heapkv::lock::LockManager;
use heapkv::HeapError;

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Handle Lifecycle Tests
// =============================================================================

#[test]
fn test_same_page_shares_lock() {
    let manager = LockManager::new(4).unwrap();

    let a = manager.lock_for_page(7, TIMEOUT).unwrap();
    let b = manager.lock_for_page(7, TIMEOUT).unwrap();

    assert_eq!(a.page(), 7);
    assert_eq!(b.page(), 7);
    assert_eq!(manager.active_pages(), 1);
    assert_eq!(manager.pool_in_use_count(), 1);
}

#[test]
fn test_different_pages_get_different_locks() {
    let manager = LockManager::new(4).unwrap();

    let _a = manager.lock_for_page(1, TIMEOUT).unwrap();
    let _b = manager.lock_for_page(2, TIMEOUT).unwrap();

    assert_eq!(manager.active_pages(), 2);
    assert_eq!(manager.pool_live_count(), 2);
}

#[test]
fn test_used_lock_returns_to_pool_on_next_request() {
    let manager = LockManager::new(4).unwrap();

    let handle = manager.lock_for_page(1, TIMEOUT).unwrap();
    handle.in_write_operation(TIMEOUT, || Ok(())).unwrap();
    drop(handle);

    // Sweep happens on the next request
    let _other = manager.lock_for_page(2, TIMEOUT).unwrap();

    assert_eq!(manager.active_pages(), 1);
    assert_eq!(manager.pool_live_count(), 1);
    assert_eq!(manager.pool_in_use_count(), 1);
}

#[test]
fn test_held_handle_is_not_reclaimed() {
    let manager = LockManager::new(4).unwrap();

    let handle = manager.lock_for_page(1, TIMEOUT).unwrap();
    handle.in_read_operation(TIMEOUT, || Ok(())).unwrap();

    let _other = manager.lock_for_page(2, TIMEOUT).unwrap();
    assert_eq!(manager.active_pages(), 2);
    assert_eq!(handle.active_operations(), 0);
}

#[test]
fn test_unused_handle_stays_bound() {
    let manager = LockManager::new(4).unwrap();

    drop(manager.lock_for_page(1, TIMEOUT).unwrap());
    let _other = manager.lock_for_page(2, TIMEOUT).unwrap();

    // Never used, so not yet eligible for reclaim
    assert_eq!(manager.active_pages(), 2);
}

// =============================================================================
// Read/Write Semantics Tests
// =============================================================================

#[test]
fn test_operation_result_is_returned() {
    let manager = LockManager::new(2).unwrap();
    let handle = manager.lock_for_page(0, TIMEOUT).unwrap();

    let read = handle.in_read_operation(TIMEOUT, || Ok(41 + 1)).unwrap();
    let write = handle
        .in_write_operation(TIMEOUT, || Ok("done".to_string()))
        .unwrap();

    assert_eq!(read, 42);
    assert_eq!(write, "done");
}

#[test]
fn test_readers_share_lock() {
    let manager = LockManager::new(2).unwrap();
    let barrier = Arc::new(Barrier::new(3));
    let mut handles = Vec::new();

    for _ in 0..3 {
        let handle = manager.lock_for_page(0, TIMEOUT).unwrap();
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            // All three readers must be inside at once to pass the barrier
            handle
                .in_read_operation(TIMEOUT, || {
                    barrier.wait();
                    Ok(())
                })
                .unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_writers_are_exclusive() {
    let manager = LockManager::new(2).unwrap();
    let inside = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..4 {
        let manager = manager.clone();
        let inside = Arc::clone(&inside);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                let handle = manager.lock_for_page(0, TIMEOUT).unwrap();
                handle
                    .in_write_operation(TIMEOUT, || {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_write_lock_times_out_while_held() {
    let manager = LockManager::new(2).unwrap();
    let holder = manager.lock_for_page(3, TIMEOUT).unwrap();
    let contender = manager.lock_for_page(3, TIMEOUT).unwrap();

    let result = holder.in_write_operation(TIMEOUT, || {
        let inner = thread::scope(|s| {
            s.spawn(|| contender.in_read_operation(Duration::from_millis(50), || Ok(())))
                .join()
                .unwrap()
        });
        Ok(inner)
    });

    let inner = result.unwrap();
    assert!(matches!(inner, Err(HeapError::OperationTimeout(_))));
}

#[test]
fn test_lock_released_on_error() {
    let manager = LockManager::new(2).unwrap();
    let handle = manager.lock_for_page(0, TIMEOUT).unwrap();

    let result: heapkv::Result<()> = handle.in_write_operation(TIMEOUT, || {
        Err(HeapError::Corruption("boom".to_string()))
    });
    assert!(matches!(result, Err(HeapError::Corruption(_))));

    // Lock is free again
    handle
        .in_write_operation(Duration::from_millis(50), || Ok(()))
        .unwrap();
    assert_eq!(handle.active_operations(), 0);
}

#[test]
fn test_lock_released_on_panic() {
    let manager = LockManager::new(2).unwrap();
    let handle = manager.lock_for_page(0, TIMEOUT).unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handle.in_write_operation(TIMEOUT, || -> heapkv::Result<()> { panic!("inside") })
    }));
    assert!(outcome.is_err());

    handle
        .in_write_operation(Duration::from_millis(50), || Ok(()))
        .unwrap();
    assert_eq!(handle.active_operations(), 0);
}

// =============================================================================
// Pool Exhaustion Tests
// =============================================================================

#[test]
fn test_lock_for_page_times_out_when_pool_exhausted() {
    let manager = LockManager::new(1).unwrap();
    let _held = manager.lock_for_page(0, TIMEOUT).unwrap();

    let result = manager.lock_for_page(1, Duration::from_millis(50));
    assert!(matches!(result, Err(HeapError::OperationTimeout(_))));
}

#[test]
fn test_waiter_gets_lock_when_handle_dropped() {
    let manager = LockManager::new(1).unwrap();
    let held = manager.lock_for_page(0, TIMEOUT).unwrap();
    held.in_read_operation(TIMEOUT, || Ok(())).unwrap();

    let waiter = {
        let manager = manager.clone();
        thread::spawn(move || {
            let handle = manager.lock_for_page(1, TIMEOUT)?;
            handle.in_write_operation(TIMEOUT, || Ok(handle.page()))
        })
    };

    thread::sleep(Duration::from_millis(50));
    drop(held);

    assert_eq!(waiter.join().unwrap().unwrap(), 1);
    assert_eq!(manager.pool_live_count(), 1);
}

#[test]
fn test_many_pages_through_small_pool() {
    let manager = LockManager::new(2).unwrap();
    let mut handles = Vec::new();

    for t in 0..4u32 {
        let manager = manager.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50u32 {
                let handle = manager.lock_for_page(t * 100 + i, TIMEOUT).unwrap();
                handle.in_write_operation(TIMEOUT, || Ok(())).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(manager.pool_live_count() <= 2);
}
