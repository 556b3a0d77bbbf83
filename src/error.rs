//! Error types for the adaptive response cache.
//!
//! Misses, expiry and eviction are ordinary control flow and never show up
//! here. Only malformed input, bad configuration and the defensive capacity
//! check produce a [`CacheError`].

use thiserror::Error;

/// Unified error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Caller supplied a message or context the cache refuses to derive a key from.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store would exceed its capacity after eviction. Should be unreachable.
    #[error("capacity invariant violated: {size} entries with max_size {max_size}")]
    CapacityInvariant { size: usize, max_size: usize },

    /// Invalid cache configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The sweeper could not be scheduled.
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;
