//! Region Allocator
//!
//! First-fit allocation of variable-size regions from a capped set of pages.

use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{HeapError, Result};

use super::Region;

/// Carves regions out of at most `page_count` pages of `max_region_size` bytes
///
/// ## Concurrency:
/// - `allocated`: byte budget, reserved with a CAS retry loop before any
///   search so concurrent callers can never overshoot the heap size
/// - `next_page`: monotonic page counter, claimed by CAS while holding
///   `free` so a claimed page's remainder is visible as soon as it counts
/// - `free`: ordered free set behind a Mutex; split and coalesce happen
///   under one lock acquisition so the ordering never tears
pub struct RegionAllocator {
    free: Mutex<BTreeSet<Region>>,
    allocated: AtomicU64,
    next_page: AtomicU32,
    page_count: u32,
    max_region_size: usize,
    min_region_size: usize,
}

impl RegionAllocator {
    pub fn new(page_count: u32, max_region_size: usize, min_region_size: usize) -> Result<Self> {
        if page_count == 0 || max_region_size == 0 {
            return Err(HeapError::Config(
                "allocator needs at least one non-empty page".to_string(),
            ));
        }
        if min_region_size == 0 || min_region_size > max_region_size {
            return Err(HeapError::Config(format!(
                "min_region_size must be in 1..={}, got {}",
                max_region_size, min_region_size
            )));
        }

        Ok(Self {
            free: Mutex::new(BTreeSet::new()),
            allocated: AtomicU64::new(0),
            next_page: AtomicU32::new(0),
            page_count,
            max_region_size,
            min_region_size,
        })
    }

    /// Allocator over `max_page_count` pages of `page_size` bytes
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.max_page_count,
            config.page_size,
            config.min_region_size,
        )
    }

    /// Allocate a region of at least `size` bytes
    ///
    /// Sizes below the minimum are rounded up. Fails with `OutOfSpace` when
    /// `size` exceeds a page or the heap budget, leaving nothing reserved.
    pub fn alloc(&self, size: usize) -> Result<Region> {
        if size > self.max_region_size {
            return Err(HeapError::OutOfSpace(format!(
                "region of {} bytes exceeds max region size {}",
                size, self.max_region_size
            )));
        }
        let size = size.max(self.min_region_size);

        self.reserve(size)?;

        // Claiming a page and publishing its remainder happen under the free
        // set lock, so no caller sees a claimed page without its free space
        let mut free = self.free.lock();
        loop {
            if let Some(region) = take_first_fit(&mut free, size) {
                return Ok(region);
            }

            let page = self.next_page.load(Ordering::Acquire);
            if page >= self.page_count {
                drop(free);
                // Budget allows it but free space is too fragmented
                self.allocated.fetch_sub(size as u64, Ordering::AcqRel);
                tracing::warn!(size, "no free region large enough and all pages claimed");
                return Err(HeapError::OutOfSpace(format!(
                    "no free region of {} bytes and all {} pages are claimed",
                    size, self.page_count
                )));
            }

            if self
                .next_page
                .compare_exchange(page, page + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::debug!(page, "claimed allocator page");
                if size < self.max_region_size {
                    free.insert(Region::new(page, size, self.max_region_size - size));
                }
                return Ok(Region::new(page, 0, size));
            }
        }
    }

    /// Return a region to the free set, merging it with adjacent free space
    ///
    /// Rejects regions outside claimed pages and regions overlapping free
    /// space (double free), without touching any state.
    pub fn free(&self, region: Region) -> Result<()> {
        if region.size() == 0
            || region.end() > self.max_region_size
            || region.page() >= self.next_page.load(Ordering::Acquire)
        {
            return Err(HeapError::InvalidRegion(format!(
                "{} is outside the allocated heap",
                region
            )));
        }

        {
            let mut free = self.free.lock();
            let probe = Region::new(region.page(), region.offset(), 0);

            let next = free.range((Included(probe), Unbounded)).next().copied();
            let prev = free.range((Unbounded, Excluded(probe))).next_back().copied();

            let overlapping = next
                .iter()
                .chain(prev.iter())
                .find(|other| other.overlaps(&region));
            if let Some(other) = overlapping {
                return Err(HeapError::InvalidRegion(format!(
                    "{} overlaps free region {}",
                    region, other
                )));
            }

            let mut merged = region;
            if let Some(next) = next.filter(|next| region.is_followed_by(next)) {
                free.remove(&next);
                merged = Region::new(merged.page(), merged.offset(), merged.size() + next.size());
            }
            if let Some(prev) = prev.filter(|prev| prev.is_followed_by(&region)) {
                free.remove(&prev);
                merged = Region::new(prev.page(), prev.offset(), prev.size() + merged.size());
            }
            free.insert(merged);
        }

        self.allocated
            .fetch_sub(region.size() as u64, Ordering::AcqRel);
        Ok(())
    }

    /// Bytes currently handed out (or reserved by an in-flight alloc)
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    /// Total heap size: `page_count * max_region_size`
    pub fn capacity_bytes(&self) -> u64 {
        self.page_count as u64 * self.max_region_size as u64
    }

    /// Pages claimed so far
    pub fn pages_claimed(&self) -> u32 {
        self.next_page.load(Ordering::Acquire)
    }

    /// Snapshot of the free set in `(page, offset)` order
    pub fn free_regions(&self) -> Vec<Region> {
        self.free.lock().iter().copied().collect()
    }

    pub fn max_region_size(&self) -> usize {
        self.max_region_size
    }

    pub fn min_region_size(&self) -> usize {
        self.min_region_size
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Reserve `size` bytes of budget (CAS retry loop)
    fn reserve(&self, size: usize) -> Result<()> {
        let capacity = self.capacity_bytes();
        let mut current = self.allocated.load(Ordering::Acquire);

        loop {
            if current + size as u64 > capacity {
                tracing::warn!(
                    size,
                    allocated = current,
                    capacity,
                    "not enough free space in heap to allocate region"
                );
                return Err(HeapError::OutOfSpace(format!(
                    "{} bytes requested, {} of {} bytes in use",
                    size, current, capacity
                )));
            }

            match self.allocated.compare_exchange_weak(
                current,
                current + size as u64,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Remove the first free region that fits, splitting off the remainder
fn take_first_fit(free: &mut BTreeSet<Region>, size: usize) -> Option<Region> {
    let found = free.iter().find(|r| r.size() >= size).copied()?;

    free.remove(&found);
    if found.size() > size {
        free.insert(Region::new(
            found.page(),
            found.offset() + size,
            found.size() - size,
        ));
    }
    Some(Region::new(found.page(), found.offset(), size))
}
