//! Bounded, expiring store of the last normalized dataset per source.
//!
//! Backed by `lru::LruCache`, read only through `peek` so lookups never
//! reorder entries: the eviction victim is always the least recently
//! *inserted* key. Entries older than the TTL are treated as absent and
//! reloaded; a failed reload keeps whatever was stored before.

use std::{
    fmt,
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use lru::LruCache;

use crate::config::CacheConfig;

struct CacheEntry<V> {
    value: Arc<V>,
    inserted_at: Instant,
}

pub struct SourceCache<V> {
    entries: LruCache<String, CacheEntry<V>>,
    ttl: Option<Duration>,
}

impl<V> SourceCache<V> {
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl())
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Fresh value for `key`, if one is stored.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<Arc<V>> {
        self.entries
            .peek(key)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Returns the cached value for `key`, running `loader` on a miss or an
    /// expired entry. A loader failure leaves the stored entry untouched and
    /// falls back to it, stale or not.
    pub fn get_or_load<E, F>(&mut self, key: &str, loader: F) -> Option<Arc<V>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_load_at(key, Instant::now(), loader)
    }

    pub fn get_or_load_at<E, F>(&mut self, key: &str, now: Instant, loader: F) -> Option<Arc<V>>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get_at(key, now) {
            debug!("Cache hit for '{key}'");
            return Some(value);
        }
        debug!("Cache miss for '{key}'");
        match loader() {
            Ok(value) => Some(self.insert_at(key, value, now)),
            Err(err) => {
                let stale = self.entries.peek(key).map(|entry| Arc::clone(&entry.value));
                if stale.is_some() {
                    warn!("Reload of '{key}' failed ({err}); keeping previous data");
                } else {
                    warn!("Load of '{key}' failed: {err}");
                }
                stale
            }
        }
    }

    pub fn insert(&mut self, key: &str, value: V) -> Arc<V> {
        self.insert_at(key, value, Instant::now())
    }

    pub fn insert_at(&mut self, key: &str, value: V, now: Instant) -> Arc<V> {
        let value = Arc::new(value);
        let entry = CacheEntry {
            value: Arc::clone(&value),
            inserted_at: now,
        };
        // Pop first so `push` only reports a genuine eviction.
        self.entries.pop(key);
        if let Some((evicted, _)) = self.entries.push(key.to_string(), entry) {
            info!("Evicted '{evicted}' from source cache");
        }
        value
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        debug!("Cleared {dropped} cached source(s)");
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.inserted_at) > ttl)
    }
}
