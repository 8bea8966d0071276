//! Time-bounded response cache
//!
//! Maps an API path to its most recent payload. Entries younger than the
//! configured TTL are served without touching the backend; anything older is
//! treated as absent. Failed refreshes are never cached.
//!
//! Concurrent misses on the same path may both fetch; the last writer
//! wins. No single-flight de-duplication, only at-most-stale-by-TTL.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    fetched_at: Instant,
}

/// TTL cache keyed by API path (query parameters are not part of the key).
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached payload for `path` if it is still fresh.
    pub fn get_fresh(&self, path: &str) -> Option<Value> {
        let entry = self.entries.get(path)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store (or replace) the entry for `path`, stamped now.
    pub fn store(&self, path: &str, payload: Value) {
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                payload,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every entry (full-process cache clear).
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
