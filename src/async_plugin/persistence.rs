//! On-disk persistence for the async-plugin cache's CachedEntry map.
//!
//! A single bincode-serialised blob at a configured path. Best-effort: every
//! failure here is logged and swallowed, never surfaced to the search path.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;

use crate::model::CachedEntry;

pub async fn load(path: &Path, ttl: chrono::Duration) -> HashMap<String, CachedEntry> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "failed to read plugin cache persistence blob");
            return HashMap::new();
        }
    };

    let map: HashMap<String, CachedEntry> = match bincode::deserialize(&bytes) {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "plugin cache persistence blob corrupt, starting empty");
            return HashMap::new();
        }
    };

    let now = Utc::now();
    let survivors: HashMap<String, CachedEntry> = map
        .into_iter()
        .filter(|(_, entry)| entry.timestamp + ttl >= now)
        .collect();

    tracing::info!(count = survivors.len(), "loaded plugin cache from disk");
    survivors
}

pub async fn save(path: &Path, entries: HashMap<String, CachedEntry>) {
    let encoded = match bincode::serialize(&entries) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%err, "failed to encode plugin cache persistence blob");
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(%err, "failed to create plugin cache persistence directory");
            return;
        }
    }

    let tmp_path = path.with_extension("bin.tmp");
    if let Err(err) = tokio::fs::write(&tmp_path, &encoded).await {
        tracing::warn!(%err, path = %path.display(), "failed to write plugin cache persistence blob");
        return;
    }
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        tracing::warn!(%err, path = %path.display(), "failed to finalize plugin cache persistence blob");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CachedEntry;

    #[tokio::test]
    async fn round_trips_and_drops_expired() {
        let dir = std::env::temp_dir().join(format!(
            "pansou-plugin-persist-test-{:?}",
            std::thread::current().id()
        ));
        let path = dir.join("blob.bin");

        let mut fresh = CachedEntry::fresh(vec![], true);
        fresh.timestamp = Utc::now();

        let mut stale = CachedEntry::fresh(vec![], true);
        stale.timestamp = Utc::now() - chrono::Duration::hours(10);

        let mut map = HashMap::new();
        map.insert("plugin:fresh".to_string(), fresh);
        map.insert("plugin:stale".to_string(), stale);

        save(&path, map).await;

        let loaded = load(&path, chrono::Duration::hours(1)).await;
        assert!(loaded.contains_key("plugin:fresh"));
        assert!(!loaded.contains_key("plugin:stale"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
