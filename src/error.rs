//! Error types for HeapKV
//!
//! Provides a unified error type for all operations. Absence of a key is
//! never an error: lookups and removals return `Option`.

use thiserror::Error;

/// Result type alias using HeapError
pub type Result<T> = std::result::Result<T, HeapError>;

/// Unified error type for HeapKV operations
#[derive(Debug, Error)]
pub enum HeapError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record / Page Errors
    // -------------------------------------------------------------------------
    #[error("Record of {size} bytes exceeds page capacity of {capacity} bytes")]
    OversizedRecord { size: usize, capacity: usize },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Page corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Allocation Errors
    // -------------------------------------------------------------------------
    #[error("Out of space: {0}")]
    OutOfSpace(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
