//! Read-through/write-through composition of the memory and disk tiers (C4).

use std::time::Duration;

use bytes::Bytes;

use super::disk::DiskCache;
use super::memory::MemoryCache;

/// TTL memory is repopulated with after a disk-tier hit.
const REPOPULATE_TTL: Duration = Duration::from_secs(10 * 60);

pub struct TwoLevelCache {
    memory: MemoryCache,
    disk: DiskCache,
}

impl TwoLevelCache {
    pub fn new(memory_budget_bytes: u64, disk_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            memory: MemoryCache::new(memory_budget_bytes),
            disk: DiskCache::new(disk_dir),
        }
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        self.disk.ensure_dir().await
    }

    /// Probes memory, then disk; a disk hit repopulates memory with a
    /// shortened TTL before being returned.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(value) = self.memory.get(key) {
            return Some(value);
        }

        let value = self.disk.get(key).await?;
        self.memory.set(key.to_string(), value.clone(), REPOPULATE_TTL);
        Some(value)
    }

    /// Synchronously updates the memory tier, then fires off an async,
    /// fire-and-forget write to disk that never blocks the caller and never
    /// surfaces its error.
    pub fn set(&self, key: String, value: Bytes, ttl: Duration) {
        self.memory.set(key.clone(), value.clone(), ttl);
    }

    /// Same as [`Self::set`] but also issues the disk write-back. Split out
    /// from `set` so callers holding only `&self` (not `Arc<Self>`) can still
    /// do the synchronous half; the orchestrator uses this variant since it
    /// always holds an `Arc<TwoLevelCache>`.
    pub fn set_with_writeback(self: &std::sync::Arc<Self>, key: String, value: Bytes, ttl: Duration) {
        self.memory.set(key.clone(), value.clone(), ttl);

        let this = self.clone();
        tokio::spawn(async move {
            this.disk.set(&key, value, ttl).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn read_through_repopulates_memory_after_eviction() {
        let dir = std::env::temp_dir().join(format!(
            "pansou-two-level-test-{:?}",
            std::thread::current().id()
        ));
        let cache = Arc::new(TwoLevelCache::new(1024, &dir));
        cache.ensure_dirs().await.unwrap();

        cache.set_with_writeback(
            "k".to_string(),
            Bytes::from_static(b"v"),
            Duration::from_secs(60),
        );
        // Give the fire-and-forget disk write a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Simulate memory-tier eviction by constructing a fresh in-process
        // cache that shares the same disk directory.
        let cache2 = TwoLevelCache::new(1024, &dir);
        assert_eq!(cache2.get("k").await, Some(Bytes::from_static(b"v")));
        // The read-through should have repopulated cache2's memory tier too.
        assert_eq!(cache2.memory.get("k"), Some(Bytes::from_static(b"v")));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
