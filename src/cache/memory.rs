//! Bounded in-RAM byte store with TTL and size-driven eviction (C2).
//!
//! A single `parking_lot::RwLock` guards the map. Reads take the cheap read
//! path on a hit; an expired entry is lazily cleaned up on the next
//! write-locked access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;

struct Entry {
    value: Bytes,
    expires_at: Instant,
    size: u64,
}

struct Inner {
    map: HashMap<String, Entry>,
    total_bytes: u64,
}

/// Key→bytes store with a total byte-size budget (default 100 MiB).
///
/// Values larger than the budget are silently not stored; otherwise, entries
/// are evicted oldest-expiry-first until there is room for the new value.
pub struct MemoryCache {
    inner: RwLock<Inner>,
    budget_bytes: u64,
}

impl MemoryCache {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: HashMap::new(),
                total_bytes: 0,
            }),
            budget_bytes,
        }
    }

    /// Returns the cached bytes for `key`, or `None` on a miss or expiry.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        {
            let guard = self.inner.read();
            if let Some(entry) = guard.map.get(key) {
                if entry.expires_at > Instant::now() {
                    return Some(entry.value.clone());
                }
            } else {
                return None;
            }
        }
        // Entry exists but is expired: take the write lock once to lazily clean it.
        let mut guard = self.inner.write();
        if let Some(entry) = guard.map.get(key) {
            if entry.expires_at <= Instant::now() {
                let size = entry.size;
                guard.map.remove(key);
                guard.total_bytes = guard.total_bytes.saturating_sub(size);
            }
        }
        None
    }

    /// Inserts `value` under `key` with the given TTL. A value larger than the
    /// configured budget is silently dropped; otherwise the soonest-expiring
    /// entries are evicted (ties broken arbitrarily) until there is room.
    pub fn set(&self, key: String, value: Bytes, ttl: Duration) {
        let size = value.len() as u64;
        if size > self.budget_bytes {
            return;
        }

        let expires_at = Instant::now() + ttl;
        let mut guard = self.inner.write();

        if let Some(old) = guard.map.remove(&key) {
            guard.total_bytes = guard.total_bytes.saturating_sub(old.size);
        }

        if guard.total_bytes + size > self.budget_bytes {
            let mut candidates: Vec<(String, Instant)> = guard
                .map
                .iter()
                .map(|(k, e)| (k.clone(), e.expires_at))
                .collect();
            candidates.sort_by_key(|(_, exp)| *exp);

            for (candidate_key, _) in candidates {
                if guard.total_bytes + size <= self.budget_bytes {
                    break;
                }
                if let Some(removed) = guard.map.remove(&candidate_key) {
                    guard.total_bytes = guard.total_bytes.saturating_sub(removed.size);
                }
            }

            if guard.total_bytes + size > self.budget_bytes {
                // Budget simply cannot fit this value alongside anything else; skip it.
                return;
            }
        }

        guard.total_bytes += size;
        guard.map.insert(
            key,
            Entry {
                value,
                expires_at,
                size,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_then_miss_after_ttl() {
        let cache = MemoryCache::new(1024);
        cache.set("a".into(), Bytes::from_static(b"hello"), Duration::from_millis(20));
        assert_eq!(cache.get("a"), Some(Bytes::from_static(b"hello")));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn oversized_value_is_not_stored() {
        let cache = MemoryCache::new(4);
        cache.set("a".into(), Bytes::from_static(b"too big"), Duration::from_secs(60));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn eviction_prefers_soonest_expiring() {
        let cache = MemoryCache::new(10);
        cache.set("old".into(), Bytes::from_static(b"12345"), Duration::from_secs(1));
        cache.set("new".into(), Bytes::from_static(b"12345"), Duration::from_secs(60));
        // Inserting a third 5-byte value needs to evict one of the two existing
        // entries; "old" expires first and must be the one chosen.
        cache.set("third".into(), Bytes::from_static(b"12345"), Duration::from_secs(60));
        assert_eq!(cache.get("old"), None);
        assert!(cache.get("new").is_some());
        assert!(cache.get("third").is_some());
    }
}
