//! Error types for cache regions.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while talking to a cache region.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The region cannot be reached right now.
    #[error("cache region unavailable: {0}")]
    Unavailable(String),

    /// The region detected damage in its own storage.
    #[error("cache region corrupted: {0}")]
    Corrupted(String),

    /// The region has been shut down.
    #[error("cache region is closed")]
    Closed,
}
