//! Local contact cache.
//!
//! Persists the sorted [`ContactBundle`](contact_types::ContactBundle) for a
//! user in compressed form, together with two auxiliary flags ("contacts
//! fetched" and the capture timestamp) that let a fast reload skip the
//! network. Staleness is judged by timestamp age only; the cache is never
//! validated against the server.
//!
//! Only the pipeline's `caching` phase writes the cache.

mod cache;
mod codec;
mod keys;
mod storage;

pub use cache::{ContactCache, CachedFlags};
pub use codec::{decode_bundle, encode_bundle};
pub use keys::CacheKeys;
pub use storage::{CacheStorage, FileCacheStorage, MemoryCacheStorage};

use thiserror::Error;

/// Error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key contains characters that cannot be used as a storage key
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
