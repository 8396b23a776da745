//! Region
//!
//! A byte range inside one allocator page.

use std::fmt;

/// `(page, offset, size)` triple; ordered by page, then offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    page: u32,
    offset: usize,
    size: usize,
}

impl Region {
    pub fn new(page: u32, offset: usize, size: usize) -> Self {
        Self { page, offset, size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// First byte past the region
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// True if `next` starts exactly where this region ends on the same page
    pub fn is_followed_by(&self, next: &Region) -> bool {
        self.page == next.page && self.end() == next.offset
    }

    /// True if both regions share at least one byte
    pub fn overlaps(&self, other: &Region) -> bool {
        self.page == other.page && self.offset < other.end() && other.offset < self.end()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} [{}, {})", self.page, self.offset, self.end())
    }
}
