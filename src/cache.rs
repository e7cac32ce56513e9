//! Bounded result cache
//!
//! Engine operations are pure functions of their inputs, so results keyed by
//! a content hash of (operation, inputs, options) can be cached safely. The
//! cache is size-bounded with LRU eviction and an optional TTL, and is safe
//! for concurrent callers. It is never required for correctness: disabling
//! it changes performance only.
//!
//! Entries carry tags (the content hashes of the rule sets that produced
//! them). There is no automatic dependency tracking; when a named rule set
//! such as a registered template changes, the caller invalidates by tag.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Derive a deterministic cache key from an operation name and the already
/// serialized/hashed parts of its inputs.
pub fn cache_key(operation: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for part in parts {
        hasher.update([0u8]);
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

struct Entry<V> {
    value: V,
    inserted: Instant,
    tags: Vec<String>,
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    // Front = least recently used.
    order: VecDeque<String>,
}

/// LRU cache with a size cap and optional TTL.
pub struct BoundedCache<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl<V: Clone> BoundedCache<V> {
    /// A cache holding at most `max_entries` values; zero disables storage
    /// entirely. `ttl` of `None` means entries never expire by age.
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries,
            ttl,
        }
    }

    /// Disabled cache: stores nothing, returns nothing.
    pub fn disabled() -> Self {
        Self::new(0, None)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().ok()?;
        let expired = match inner.map.get(key) {
            Some(entry) => self
                .ttl
                .map(|ttl| entry.inserted.elapsed() > ttl)
                .unwrap_or(false),
            None => return None,
        };
        if expired {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        // Bump recency.
        inner.order.retain(|k| k != key);
        inner.order.push_back(key.to_string());
        inner.map.get(key).map(|e| e.value.clone())
    }

    pub fn put(&self, key: &str, tags: Vec<String>, value: V) {
        if self.max_entries == 0 {
            return;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        // Drop any old entry first so an update never evicts a neighbor.
        if inner.map.remove(key).is_some() {
            inner.order.retain(|k| k != key);
        }
        while inner.map.len() >= self.max_entries {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
        inner.map.insert(
            key.to_string(),
            Entry {
                value,
                inserted: Instant::now(),
                tags,
            },
        );
        inner.order.push_back(key.to_string());
    }

    /// Remove one entry by exact key.
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.map.remove(key);
            inner.order.retain(|k| k != key);
        }
    }

    /// Remove every entry tagged with the given input hash.
    pub fn invalidate_tag(&self, tag: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            let stale: Vec<String> = inner
                .map
                .iter()
                .filter(|(_, e)| e.tags.iter().any(|t| t == tag))
                .map(|(k, _)| k.clone())
                .collect();
            for key in stale {
                inner.map.remove(&key);
                inner.order.retain(|k| *k != key);
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.map.clear();
            inner.order.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
