//! In-memory TTL cache implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::{Cache, CacheError, cache_key};

/// Upper bound on a single entry's TTL (about a century).
const MAX_TTL_SECONDS: i64 = 100 * 366 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &[u8], ttl_seconds: i64, now: Instant) -> Self {
        let ttl = Duration::from_secs(ttl_seconds.clamp(0, MAX_TTL_SECONDS) as u64);
        Self {
            value: value.to_vec(),
            expires_at: now + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory cache for single-process deployments and tests.
///
/// Expired entries are evicted lazily by the next operation touching the key.
///
/// # Thread Safety
///
/// Entries live behind a mutex that is never held across an await point, so
/// the cache is safe to share across tasks and threads.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create a new empty memory cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of physically stored entries, including expired ones not yet evicted.
    pub fn stored_entries(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries_count", &self.stored_entries())
            .finish()
    }
}

/// Drop the entry under `key` if it has expired; report whether a live one remains.
fn retain_live(entries: &mut HashMap<String, CacheEntry>, key: &str, now: Instant) -> bool {
    match entries.get(key) {
        Some(entry) if entry.is_live(now) => true,
        Some(_) => {
            entries.remove(key);
            false
        }
        None => false,
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, owner: &str, key: &str) -> Result<Vec<u8>, CacheError> {
        let full_key = cache_key(owner, key);
        let mut entries = self.entries.lock();
        if !retain_live(&mut entries, &full_key, Instant::now()) {
            return Err(CacheError::NotFound { key: full_key });
        }
        Ok(entries[&full_key].value.clone())
    }

    async fn set(
        &self,
        owner: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        let full_key = cache_key(owner, key);
        let entry = CacheEntry::new(value, ttl_seconds, Instant::now());
        self.entries.lock().insert(full_key, entry);
        Ok(())
    }

    async fn add(
        &self,
        owner: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: i64,
    ) -> Result<(), CacheError> {
        let full_key = cache_key(owner, key);
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if retain_live(&mut entries, &full_key, now) {
            return Err(CacheError::KeyExisted { key: full_key });
        }
        entries.insert(full_key, CacheEntry::new(value, ttl_seconds, now));
        Ok(())
    }

    async fn delete(
        &self,
        owner: &str,
        key: &str,
        expected: Option<&[u8]>,
    ) -> Result<(), CacheError> {
        let full_key = cache_key(owner, key);
        let mut entries = self.entries.lock();
        if !retain_live(&mut entries, &full_key, Instant::now()) {
            return Ok(());
        }
        if let Some(expected) = expected {
            if entries[&full_key].value != expected {
                return Err(CacheError::ValueNotMatched { key: full_key });
            }
        }
        entries.remove(&full_key);
        Ok(())
    }
}
