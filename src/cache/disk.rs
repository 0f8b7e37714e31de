//! Durable key→bytes store with TTL (C3).
//!
//! One file per key, named `hex(blake3(key))[..32] + ".bin"`, holding a
//! bincode-serialised [`DiskRecord`]. There are no cross-key transactional
//! guarantees; a read or write failure is logged and treated as a miss/no-op
//! by the caller, never propagated.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct DiskRecord {
    expires_at_unix_ms: u64,
    value: Vec<u8>,
}

/// Durable on-disk cache tier. Holds only a directory path; every operation
/// reopens the relevant file, so concurrent instances pointed at the same
/// directory are safe to use from multiple processes (best-effort).
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        let hex = &digest.to_hex()[..32];
        self.dir.join(format!("{hex}.bin"))
    }

    /// Ensures the backing directory exists. Called once at startup; a
    /// failure here is surfaced since it means the cache cannot function at
    /// all, unlike per-key read/write failures.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match bincode::deserialize::<DiskRecord>(&bytes) {
                Ok(record) => {
                    let now_ms = now_unix_ms();
                    if record.expires_at_unix_ms > now_ms {
                        Some(Bytes::from(record.value))
                    } else {
                        None
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, path = %path.display(), "disk cache record corrupt");
                    None
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "disk cache read failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        let path = self.path_for(key);
        let record = DiskRecord {
            expires_at_unix_ms: now_unix_ms() + ttl.as_millis() as u64,
            value: value.to_vec(),
        };

        let encoded = match bincode::serialize(&record) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, "failed to encode disk cache record");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(%err, "failed to create disk cache directory");
                return;
            }
        }

        if let Err(err) = write_atomic(&path, &encoded).await {
            tracing::warn!(%err, path = %path.display(), "disk cache write failed");
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("bin.tmp");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("pansou-disk-cache-test-{:?}", std::thread::current().id()));
        let cache = DiskCache::new(&dir);
        cache.ensure_dir().await.unwrap();

        cache
            .set("k1", Bytes::from_static(b"payload"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k1").await, Some(Bytes::from_static(b"payload")));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let dir = std::env::temp_dir().join(format!("pansou-disk-cache-test-ttl-{:?}", std::thread::current().id()));
        let cache = DiskCache::new(&dir);
        cache.ensure_dir().await.unwrap();

        cache
            .set("k1", Bytes::from_static(b"payload"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k1").await, None);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
