//! Response cache
//!
//! LRU eviction bounded by `max_entries`, plus a per-entry TTL. One cache is
//! built at startup and handed to whoever needs it.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fundfacts_config::CacheConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<V> {
    entries: LruCache<String, Entry<V>>,
    stats: CacheStats,
}

pub struct ResponseCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_seconds))
    }

    /// Normalized key: lowercase with collapsed whitespace
    pub fn key(query: &str) -> String {
        query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let expired = match inner.entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) <= self.ttl => {
                let value = entry.value.clone();
                inner.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
            inner.stats.expirations += 1;
        }
        inner.stats.misses += 1;
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    fn set_at(&self, key: String, value: V, now: Instant) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let entry = Entry {
            value,
            inserted_at: now,
        };
        if let Some((evicted_key, _)) = inner.entries.push(key.clone(), entry) {
            if evicted_key != key {
                inner.stats.evictions += 1;
            }
        }
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            ..inner.stats
        }
    }
}
