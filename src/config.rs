//! Configuration for HeapKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HeapError, Result};
use crate::storage::SENTINEL_SIZE;

/// Main configuration for a HeapKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the heap file
    /// Internal structure:
    ///   {data_dir}/
    ///     └── heap.db          (fixed-size pages, page N at N * page_size)
    pub data_dir: PathBuf,

    /// Size of one on-disk page in bytes
    pub page_size: usize,

    /// Hard cap on the number of pages (engine tail growth and allocator heap)
    pub max_page_count: u32,

    // -------------------------------------------------------------------------
    // Concurrency Configuration
    // -------------------------------------------------------------------------
    /// Max number of page locks alive at once
    pub lock_pool_capacity: usize,

    /// Upper bound for a single engine operation (milliseconds)
    pub operation_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Allocator Configuration
    // -------------------------------------------------------------------------
    /// Smallest region the allocator hands out (requests are rounded up)
    pub min_region_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./heapkv_data"),
            page_size: 4096,
            max_page_count: 65_536,
            lock_pool_capacity: 25,
            operation_timeout_ms: 10_000,
            min_region_size: 16,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Per-operation timeout as a Duration
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Reject settings the engine or allocator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.page_size <= SENTINEL_SIZE {
            return Err(HeapError::Config(format!(
                "page_size must be larger than {} bytes, got {}",
                SENTINEL_SIZE, self.page_size
            )));
        }
        if self.max_page_count == 0 {
            return Err(HeapError::Config("max_page_count must be positive".to_string()));
        }
        if self.lock_pool_capacity == 0 {
            return Err(HeapError::Config(
                "lock_pool_capacity must be positive".to_string(),
            ));
        }
        if self.min_region_size == 0 || self.min_region_size > self.page_size {
            return Err(HeapError::Config(format!(
                "min_region_size must be in 1..={}, got {}",
                self.page_size, self.min_region_size
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for the heap file)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the maximum number of pages
    pub fn max_page_count(mut self, count: u32) -> Self {
        self.config.max_page_count = count;
        self
    }

    /// Set the capacity of the page lock pool
    pub fn lock_pool_capacity(mut self, capacity: usize) -> Self {
        self.config.lock_pool_capacity = capacity;
        self
    }

    /// Set the per-operation timeout (in milliseconds)
    pub fn operation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.operation_timeout_ms = ms;
        self
    }

    /// Set the allocator's minimum region size (in bytes)
    pub fn min_region_size(mut self, size: usize) -> Self {
        self.config.min_region_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
