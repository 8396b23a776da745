//! # HeapKV
//!
//! An embedded, single-process key-value store on a page-structured heap file:
//! - Fixed-size pages, append-mostly, tombstone deletion
//! - Tail page buffer for append-heavy writes
//! - Per-page read-write locks drawn from a bounded lock pool
//! - A first-fit region allocator for bounded-capacity heaps
//!
//! Keys and values are opaque byte slices; turning caller objects into bytes
//! is left to the caller.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Engine (put / get / remove)                  │
//! └───────┬──────────────────────┬──────────────────────┬───────┘
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!  ┌─────────────┐        ┌─────────────┐        ┌─────────────┐
//!  │  Tail Page  │        │    Index    │        │ LockManager │
//!  │ (ArcSwap)   │        │ key → page  │        │ (per page)  │
//!  └──────┬──────┘        └─────────────┘        └──────┬──────┘
//!         │                                             │
//!         ▼                                             ▼
//!  ┌─────────────┐                               ┌─────────────┐
//!  │  PageStore  │                               │ ObjectPool  │
//!  │ (pread/pwr) │                               │  (RwLocks)  │
//!  └─────────────┘                               └─────────────┘
//!
//!  RegionAllocator: standalone space manager for capped heaps
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod index;
pub mod pool;
pub mod lock;
pub mod alloc;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use alloc::{Region, RegionAllocator};
pub use config::Config;
pub use engine::{Engine, LockStats};
pub use error::{HeapError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HeapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
