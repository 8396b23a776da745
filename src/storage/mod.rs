//! Storage Module
//!
//! Persistent storage layer: fixed-size pages in a single heap file.
//!
//! ## Responsibilities
//! - Encode/decode records with tombstone deletion
//! - Pack records into pages, serialize pages to fixed-size blocks
//! - Positioned page I/O against the heap file
//!
//! ## Page Format
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ Record 0                                       │
//! │ ┌─────────┬─────────┬─────────┬─────┬───────┐  │
//! │ │KeySz(2) │ValSz(2) │ Del (1) │ Key │ Value │  │
//! │ └─────────┴─────────┴─────────┴─────┴───────┘  │
//! │ Record 1 ...                                   │
//! ├────────────────────────────────────────────────┤
//! │ Zero padding (first 8 bytes = end-of-page)     │
//! └────────────────────────────────────────────────┘
//! ```

mod page;
mod record;
mod store;

pub use page::Page;
pub use record::Record;
pub use store::{PageIter, PageStore};

/// Record header: KeySize (2) + ValueSize (2) + Deleted (1) = 5 bytes
pub const HEADER_SIZE: usize = 5;

/// Leading bytes that are all zero where no more records follow
pub const SENTINEL_SIZE: usize = 8;
