//! Per-plugin cache, dual-channel search, background refresh, scored
//! eviction, and crash-safe persistence — the hardest part of the search
//! engine.
//!
//! [`AsyncPluginAdapter`] is a reusable decorator: it wraps any
//! [`crate::adapters::SourceAdapter`] and gives it this module's
//! cache-and-refresh behavior without the orchestrator needing to know the
//! difference between a plain channel adapter and a cached plugin.

pub mod persistence;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::adapters::SourceAdapter;
use crate::model::{CachedEntry, SearchResult};

/// Tunables for the async-plugin subsystem.
#[derive(Debug, Clone)]
pub struct AsyncPluginConfig {
    pub response_timeout: Duration,
    pub processing_timeout: Duration,
    pub cache_ttl: chrono::Duration,
    pub max_background_workers: usize,
    pub max_background_tasks: usize,
    pub persist_interval: Duration,
    pub persist_path: PathBuf,
    /// Above this many entries, scored eviction kicks in. Chosen generously
    /// since each entry is small and the access pattern (one per
    /// plugin×fingerprint) is bursty. See DESIGN.md for the reasoning.
    pub soft_ceiling: usize,
}

impl Default for AsyncPluginConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(2),
            processing_timeout: Duration::from_secs(30),
            cache_ttl: chrono::Duration::hours(1),
            max_background_workers: 20,
            max_background_tasks: 100,
            persist_interval: Duration::from_secs(120),
            persist_path: PathBuf::from("./data/plugin_cache.bin"),
            soft_ceiling: 5_000,
        }
    }
}

/// The per-plugin cache and dual-channel search engine.
///
/// Always used behind an `Arc` — background tasks it spawns need to outlive
/// the call that triggered them, so every method that can spawn work takes
/// `self: &Arc<Self>`.
pub struct AsyncPluginCache {
    entries: DashMap<String, CachedEntry>,
    config: AsyncPluginConfig,
    background_semaphore: Arc<Semaphore>,
    outstanding: Arc<AtomicUsize>,
    persist_lock: Arc<tokio::sync::Mutex<()>>,
    persist_dirty: Arc<std::sync::atomic::AtomicBool>,
}

impl AsyncPluginCache {
    pub fn new(config: AsyncPluginConfig) -> Self {
        Self {
            entries: DashMap::new(),
            background_semaphore: Arc::new(Semaphore::new(config.max_background_workers)),
            outstanding: Arc::new(AtomicUsize::new(0)),
            persist_lock: Arc::new(tokio::sync::Mutex::new(())),
            persist_dirty: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            config,
        }
    }

    /// Loads whatever survives TTL filtering from the configured persistence
    /// path, falling back to an empty cache on any failure — persistence is
    /// best-effort and never blocks startup.
    pub async fn load(config: AsyncPluginConfig) -> Self {
        let loaded = persistence::load(&config.persist_path, config.cache_ttl).await;
        let cache = Self::new(config);
        for (key, entry) in loaded {
            cache.entries.insert(key, entry);
        }
        cache
    }

    fn namespaced_key(plugin_name: &str, cache_key: &str) -> String {
        format!("{plugin_name}:{cache_key}")
    }

    fn is_expired(entry: &CachedEntry, ttl: chrono::Duration) -> bool {
        entry.age() >= ttl
    }

    /// Dual-channel search: a cache hit returns immediately (and may trigger
    /// a background refresh); a miss races a response-timeout deadline
    /// against the real fetch, returning whichever arrives first — or
    /// stale/empty data if the deadline wins.
    pub async fn search(
        self: &Arc<Self>,
        adapter: Arc<dyn SourceAdapter>,
        keyword: &str,
        cache_key: &str,
    ) -> Vec<SearchResult> {
        let key = Self::namespaced_key(adapter.name(), cache_key);

        if let Some(mut entry) = self.entries.get_mut(&key) {
            if !Self::is_expired(&entry, self.config.cache_ttl) {
                entry.touch();
                let results = entry.results.clone();
                let age = entry.age();
                drop(entry);

                let stale_fraction = age.num_milliseconds() as f64
                    / self.config.cache_ttl.num_milliseconds().max(1) as f64;
                if stale_fraction > 0.8 {
                    self.maybe_spawn_refresh(adapter, keyword.to_string(), key);
                }
                return results;
            }
        }

        let stale = self.entries.get(&key).map(|e| e.results.clone());
        self.run_dual_channel(adapter, keyword.to_string(), key, stale)
            .await
    }

    async fn run_dual_channel(
        self: &Arc<Self>,
        adapter: Arc<dyn SourceAdapter>,
        keyword: String,
        key: String,
        stale: Option<Vec<SearchResult>>,
    ) -> Vec<SearchResult> {
        let processing_timeout = self.config.processing_timeout;
        let this = self.clone();
        let background_key = key.clone();

        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(processing_timeout, adapter.search(&keyword)).await;
            let merged = match outcome {
                Ok(Ok(fresh)) => {
                    let merged = this.merge_with_old(&background_key, fresh);
                    this.entries
                        .insert(background_key.clone(), CachedEntry::fresh(merged.clone(), true));
                    this.maybe_evict();
                    this.schedule_persist();
                    Some(merged)
                }
                Ok(Err(err)) => {
                    tracing::warn!(plugin = adapter.name(), error = %err, "plugin adapter failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(plugin = adapter.name(), "plugin adapter timed out");
                    None
                }
            };
            // The fast-path reader may already be gone (deadline elapsed); a
            // closed receiver here is expected, not an error — the caller's
            // cancellation never reaches this background task.
            let _ = tx.send(merged);
        });

        match tokio::time::timeout(self.config.response_timeout, rx).await {
            Ok(Ok(Some(results))) => results,
            _ => stale.unwrap_or_default(),
        }
    }

    /// Merges a fresh fetch with whatever is currently cached under `key`:
    /// every fresh result is kept; every old result whose id isn't among
    /// the fresh ones is appended after.
    fn merge_with_old(&self, key: &str, fresh: Vec<SearchResult>) -> Vec<SearchResult> {
        let Some(old_entry) = self.entries.get(key) else {
            return fresh;
        };

        let fresh_ids: std::collections::HashSet<&str> =
            fresh.iter().map(|r| r.id.as_str()).collect();

        let mut merged = fresh;
        merged.extend(
            old_entry
                .results
                .iter()
                .filter(|r| !fresh_ids.contains(r.id.as_str()))
                .cloned(),
        );
        merged
    }

    /// Admission-gated background refresh: declines rather than queues
    /// when either the concurrency semaphore or the outstanding-task
    /// ceiling is exhausted.
    fn maybe_spawn_refresh(self: &Arc<Self>, adapter: Arc<dyn SourceAdapter>, keyword: String, key: String) {
        loop {
            let current = self.outstanding.load(Ordering::SeqCst);
            if current >= self.config.max_background_tasks {
                return;
            }
            if self
                .outstanding
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        let permit = match self.background_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        };

        let this = self.clone();
        let processing_timeout = self.config.processing_timeout;
        tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::time::timeout(processing_timeout, adapter.search(&keyword)).await;
            match outcome {
                Ok(Ok(fresh)) => {
                    let merged = this.merge_with_old(&key, fresh);
                    this.entries.insert(key, CachedEntry::fresh(merged, true));
                    this.maybe_evict();
                    this.schedule_persist();
                }
                Ok(Err(err)) => {
                    tracing::warn!(plugin = adapter.name(), error = %err, "background refresh failed");
                }
                Err(_) => {
                    tracing::warn!(plugin = adapter.name(), "background refresh timed out");
                }
            }
            this.outstanding.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Scored eviction: once the cache grows past its soft ceiling, remove
    /// the lowest-scored entries down to the ceiling.
    fn maybe_evict(&self) {
        if self.entries.len() <= self.config.soft_ceiling {
            return;
        }

        let mut scored: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().eviction_score()))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let overflow = self.entries.len() - self.config.soft_ceiling;
        for (key, _) in scored.into_iter().take(overflow) {
            self.entries.remove(&key);
        }
    }

    /// Debounces repeated mutation-triggered persistence requests into at
    /// most one in-flight writer; overlapping triggers coalesce rather than
    /// queuing a write each.
    fn schedule_persist(self: &Arc<Self>) {
        if self
            .persist_dirty
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            this.persist_dirty.store(false, Ordering::SeqCst);
            this.persist_now().await;
        });
    }

    /// Serialises the full cache map to disk. Best-effort: failures are
    /// logged by [`persistence::save`] and never propagated.
    pub async fn persist_now(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshot: HashMap<String, CachedEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        persistence::save(&self.config.persist_path, snapshot).await;
    }

    /// Runs forever, flushing to disk on the configured interval
    /// independent of the mutation-debounced path.
    pub async fn run_periodic_persist(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.persist_interval);
        loop {
            interval.tick().await;
            self.persist_now().await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Decorator wrapping any [`SourceAdapter`] with this module's cache-and-
/// refresh behavior. The wrapped adapter's identity (`name`/`priority`)
/// passes through unchanged; only `search` is intercepted.
pub struct AsyncPluginAdapter {
    inner: Arc<dyn SourceAdapter>,
    cache: Arc<AsyncPluginCache>,
}

impl AsyncPluginAdapter {
    pub fn new(inner: Arc<dyn SourceAdapter>, cache: Arc<AsyncPluginCache>) -> Self {
        Self { inner, cache }
    }

    /// Runs the dual-channel search for this adapter against `cache_key`
    /// (the orchestrator's request fingerprint, namespaced per-plugin
    /// internally — see [`AsyncPluginCache::search`]).
    pub async fn search_cached(&self, keyword: &str, cache_key: &str) -> Vec<SearchResult> {
        self.cache.search(self.inner.clone(), keyword, cache_key).await
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl SourceAdapter for AsyncPluginAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    async fn search(&self, keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
        // Plain SourceAdapter::search has no cache-key argument, so a direct
        // call bypasses the per-plugin cache entirely and just proxies. The
        // orchestrator always goes through `search_cached` instead; this
        // impl exists so `AsyncPluginAdapter` can still satisfy the trait
        // object contract where a plain adapter is expected (registry plumbing, tests).
        self.inner.search(keyword).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration as StdDuration;

    struct SlowAdapter {
        delay: StdDuration,
        calls: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for SlowAdapter {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(vec![SearchResult {
                id: "1".into(),
                title: "t".into(),
                content: "c".into(),
                datetime: Utc::now(),
                channel: String::new(),
                links: vec![],
            }])
        }
    }

    #[tokio::test]
    async fn dual_channel_returns_empty_then_full_on_cache_hit() {
        let calls = Arc::new(StdAtomicUsize::new(0));
        let adapter: Arc<dyn SourceAdapter> = Arc::new(SlowAdapter {
            delay: StdDuration::from_millis(150),
            calls: calls.clone(),
        });

        let cache = Arc::new(AsyncPluginCache::new(AsyncPluginConfig {
            response_timeout: StdDuration::from_millis(20),
            processing_timeout: StdDuration::from_secs(5),
            ..AsyncPluginConfig::default()
        }));

        let first = cache.search(adapter.clone(), "kw", "k").await;
        assert!(first.is_empty());

        tokio::time::sleep(StdDuration::from_millis(250)).await;

        let second = cache.search(adapter.clone(), "kw", "k").await;
        assert_eq!(second.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn merge_keeps_new_first_then_old_non_duplicates() {
        let cache = AsyncPluginCache::new(AsyncPluginConfig::default());
        let old = vec![mk("A"), mk("B"), mk("C")];
        cache
            .entries
            .insert("p:k".to_string(), CachedEntry::fresh(old, true));

        let fresh = vec![mk("B"), mk("D")];
        let merged = cache.merge_with_old("p:k", fresh);

        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "D", "A", "C"]);
    }

    struct ConcurrencyTrackingAdapter {
        delay: StdDuration,
        in_flight: Arc<StdAtomicUsize>,
        max_seen: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for ConcurrencyTrackingAdapter {
        fn name(&self) -> &str {
            "tracked"
        }

        async fn search(&self, _keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn admission_respects_worker_and_ceiling_bounds() {
        let in_flight = Arc::new(StdAtomicUsize::new(0));
        let max_seen = Arc::new(StdAtomicUsize::new(0));
        let adapter: Arc<dyn SourceAdapter> = Arc::new(ConcurrencyTrackingAdapter {
            delay: StdDuration::from_millis(60),
            in_flight: in_flight.clone(),
            max_seen: max_seen.clone(),
        });

        let cache = Arc::new(AsyncPluginCache::new(AsyncPluginConfig {
            max_background_workers: 2,
            max_background_tasks: 3,
            ..AsyncPluginConfig::default()
        }));

        // 10 simultaneous refresh attempts against distinct keys: admission
        // must decline past the outstanding-task ceiling (3) and never let
        // more than the worker semaphore (2) run at once.
        for i in 0..10 {
            cache.maybe_spawn_refresh(adapter.clone(), "kw".to_string(), format!("p:{i}"));
        }

        assert!(cache.outstanding.load(Ordering::SeqCst) <= 3);

        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(cache.outstanding.load(Ordering::SeqCst), 0);
    }

    fn mk(id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: String::new(),
            content: String::new(),
            datetime: Utc::now(),
            channel: String::new(),
            links: vec![],
        }
    }
}
