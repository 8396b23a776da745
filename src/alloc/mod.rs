//! Allocator Module
//!
//! Bounded-heap space management, independent of the append-only engine.
//!
//! ## Responsibilities
//! - Hand out variable-size regions from a fixed number of fixed-size pages
//! - Enforce a hard byte budget (`page_count * max_region_size`)
//! - Coalesce adjacent free regions eagerly on free
//!
//! ## Free Set
//! ```text
//! page 0: [alloc 0..64][free 64..128][alloc 128..4096]
//! page 1: [free 0..4096]
//!          ^ ordered by (page, offset), first fit wins
//! ```

mod allocator;
mod region;

pub use allocator::RegionAllocator;
pub use region::Region;
