//! Lock Module
//!
//! Per-page read-write locking backed by a bounded lock pool.
//!
//! ## Responsibilities
//! - One shared lock per page number while operations on it are in flight
//! - Readers shared, writers exclusive, bounded by a timeout
//! - Return idle locks to the pool so memory stays bounded by pool capacity
//!
//! ## Lock Discipline
//! Resolve page number → acquire that page's lock → do I/O → release.
//! Callers never hold two page locks at once, so there is no cross-page
//! lock ordering to get wrong.

mod handle;
mod manager;

pub use handle::LockHandle;
pub use manager::LockManager;
