//! Expiring key-value cache abstraction.
//!
//! This module provides:
//! - [`Cache`] - Trait for TTL cache backends, scoped by owner and key
//! - [`MemoryCache`] - In-process implementation with lazy eviction
//! - [`cache_key`] - The namespacing convention shared by all backends
//!
//! # Key Convention
//!
//! Keys follow the pattern: `{owner}:{tag}`, e.g. `wx1234:access-token`.
//!
//! # Example
//!
//! ```rust,ignore
//! use wecred_core::cache::{Cache, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("wx1234", "access-token", b"payload", 7200).await.unwrap();
//! assert_eq!(cache.get("wx1234", "access-token").await.unwrap(), b"payload");
//! ```

use async_trait::async_trait;
use thiserror::Error;

mod memory;

pub use memory::MemoryCache;

/// Build the namespaced storage key for an owner and a logical key.
pub fn cache_key(owner: &str, key: &str) -> String {
    format!("{}:{}", owner, key)
}

/// Error type for cache operations.
///
/// `NotFound`, `KeyExisted` and `ValueNotMatched` are expected control-flow
/// outcomes; `Backend` reports a storage failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent or its entry has expired.
    #[error("key not found in cache: {key}")]
    NotFound { key: String },

    /// `add` found a live entry under the key.
    #[error("key existed in cache: {key}")]
    KeyExisted { key: String },

    /// Compare-delete found a different value under the key.
    #[error("value not matched for key: {key}")]
    ValueNotMatched { key: String },

    /// The storage backend could not be reached or failed.
    #[error("cache backend error: {message}")]
    Backend { message: String },
}

/// Abstraction over expiring cache backends.
///
/// Every operation is scoped by `(owner, key)`. An entry whose expiry has
/// passed is logically absent, whether or not it has been physically removed.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Retrieve a live value.
    ///
    /// Returns [`CacheError::NotFound`] if the key is absent or expired.
    async fn get(&self, owner: &str, key: &str) -> Result<Vec<u8>, CacheError>;

    /// Store a value unconditionally, replacing any existing entry.
    ///
    /// A `ttl_seconds` of zero or less stores an already-expired entry.
    async fn set(
        &self,
        owner: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), CacheError>;

    /// Store a value only if no live entry exists under the key.
    ///
    /// Returns [`CacheError::KeyExisted`] without mutation otherwise.
    async fn add(
        &self,
        owner: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), CacheError>;

    /// Delete a value, optionally comparing it first.
    ///
    /// With `expected` set, deletion only proceeds when the live value equals
    /// it byte-for-byte, otherwise [`CacheError::ValueNotMatched`]. Deleting
    /// an absent key succeeds.
    async fn delete(
        &self,
        owner: &str,
        key: &str,
        expected: Option<&[u8]>,
    ) -> Result<(), CacheError>;
}
