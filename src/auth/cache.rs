use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;

/// Key/value store with per-entry expiry.
///
/// Expired entries are never returned; the store is responsible for expiry,
/// callers only pick the TTL.
pub trait CacheStore: Send + Sync {
    fn put(&self, key: &str, value: String, ttl: Duration);

    fn get(&self, key: &str) -> Option<String>;

    /// Returns true if a live entry was removed.
    fn delete(&self, key: &str) -> bool;
}

const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Each entry lives for the TTL it was written with; a rewrite restarts it.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Process-local cache on top of moka.
pub struct MemoryCache {
    inner: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        let inner = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .expire_after(EntryTtl)
            .build();
        Self { inner }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn put(&self, key: &str, value: String, ttl: Duration) {
        self.inner.insert(key.to_string(), Entry { value, ttl });
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|entry| entry.value)
    }

    fn delete(&self, key: &str) -> bool {
        let live = self.inner.contains_key(key);
        self.inner.invalidate(key);
        live
    }
}
