//! Ties C1–C8 together: build tasks, execute them under the pool, postprocess,
//! and cache (C9).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::adapters::SourceAdapter;
use crate::async_plugin::AsyncPluginCache;
use crate::cache::TwoLevelCache;
use crate::cache_key;
use crate::config::Config;
use crate::model::{ResultType, SearchRequest, SearchResponse, SearchResult, SourceType};
use crate::pipeline;

/// A registered channel scraper, alongside the identifier callers select it by.
pub struct ChannelEntry {
    pub name: String,
    pub adapter: Arc<dyn SourceAdapter>,
}

/// A registered plugin adapter, wrapped so the orchestrator can both run its
/// cached dual-channel search (C7) and answer "what plugins exist" queries
/// (cache-key normalisation, `/api/health`).
pub struct PluginEntry {
    pub name: String,
    pub adapter: Arc<dyn SourceAdapter>,
}

pub struct Orchestrator {
    config: Arc<Config>,
    cache: Arc<TwoLevelCache>,
    async_plugin_cache: Arc<AsyncPluginCache>,
    channels: Vec<ChannelEntry>,
    plugins: Vec<PluginEntry>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<TwoLevelCache>,
        async_plugin_cache: Arc<AsyncPluginCache>,
        channels: Vec<ChannelEntry>,
        plugins: Vec<PluginEntry>,
    ) -> Self {
        Self {
            config,
            cache,
            async_plugin_cache,
            channels,
            plugins,
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    fn all_plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    /// Runs one search request end to end: normalise, probe the
    /// cache, fan out on a miss, postprocess, cache the full response, and
    /// return the view the caller asked for.
    pub async fn search(self: &Arc<Self>, req: SearchRequest) -> SearchResponse {
        let req = req.normalize();
        let all_plugins = self.all_plugin_names();

        let fingerprint = cache_key::compute(
            &req.keyword,
            &req.channels,
            req.result_type.as_str(),
            req.source_type.as_str(),
            &req.plugins,
            &all_plugins,
        );

        if !req.force_refresh && self.config.cache_enabled {
            if let Some(bytes) = self.cache.get(&fingerprint).await {
                if let Ok(full) = bincode::deserialize::<SearchResponse>(&bytes) {
                    return pipeline::project(full, req.result_type);
                }
                tracing::warn!(%fingerprint, "cached response corrupt, treating as miss");
            }
        }

        let target_channels = self.target_channels(&req);
        let target_plugins = self.target_plugins(&req, &all_plugins);

        let mut tasks: Vec<
            Box<dyn FnOnce() -> futures_util::future::BoxFuture<'static, Vec<SearchResult>> + Send>,
        > = Vec::new();

        if matches!(req.source_type, SourceType::All | SourceType::Tg) {
            for channel in &self.channels {
                if !target_channels.contains(&channel.name) {
                    continue;
                }
                let adapter = channel.adapter.clone();
                let keyword = req.keyword.clone();
                tasks.push(Box::new(move || {
                    Box::pin(async move { adapter.search(&keyword).await.unwrap_or_default() })
                }));
            }
        }

        if matches!(req.source_type, SourceType::All | SourceType::Plugin) {
            for plugin in &self.plugins {
                if !target_plugins.contains(&plugin.name) {
                    continue;
                }
                let adapter = plugin.adapter.clone();
                let keyword = req.keyword.clone();
                let async_plugin_cache = self.async_plugin_cache.clone();
                let fingerprint = fingerprint.clone();
                tasks.push(Box::new(move || {
                    Box::pin(async move {
                        async_plugin_cache.search(adapter, &keyword, &fingerprint).await
                    })
                }));
            }
        }

        if tasks.is_empty() {
            return pipeline::project(SearchResponse::default(), req.result_type);
        }

        let concurrency = if req.concurrency > 0 {
            req.concurrency
        } else {
            tasks.len() + 10
        };
        let deadline = Duration::from_secs(self.config.plugin_timeout_secs);

        let results = crate::pool::execute_batch(tasks, concurrency, deadline).await;
        let raw: Vec<SearchResult> = results.into_iter().flatten().flatten().collect();

        let full = pipeline::build(raw, &req.keyword);

        if self.config.cache_enabled {
            if let Ok(encoded) = bincode::serialize(&full) {
                let ttl = Duration::from_secs(self.config.cache_ttl_minutes.max(0) as u64 * 60);
                self.cache
                    .set_with_writeback(fingerprint, Bytes::from(encoded), ttl);
            }
        }

        pipeline::project(full, req.result_type)
    }

    fn target_channels(&self, req: &SearchRequest) -> HashSet<String> {
        if req.channels.is_empty() {
            if self.config.default_channel_list().is_empty() {
                self.channels.iter().map(|c| c.name.clone()).collect()
            } else {
                self.config.default_channel_list().into_iter().collect()
            }
        } else {
            req.channels.iter().cloned().collect()
        }
    }

    /// If the caller specified every registered plugin, treat it the same as
    /// "unspecified" — both mean "all plugins".
    fn target_plugins(&self, req: &SearchRequest, all_plugins: &[String]) -> HashSet<String> {
        if req.plugins.is_empty() {
            return all_plugins.iter().cloned().collect();
        }

        let requested: HashSet<String> = req.plugins.iter().cloned().collect();
        let full: HashSet<String> = all_plugins.iter().cloned().collect();
        if requested == full {
            full
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubAdapter {
        name: String,
        result: SearchResult,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, _keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
            Ok(vec![self.result.clone()])
        }
    }

    fn test_config() -> Config {
        Config {
            cache_enabled: true,
            memory_cache_bytes: 1024 * 1024,
            cache_ttl_minutes: 60,
            plugin_timeout_secs: 5,
            async_plugin_enabled: true,
            async_response_timeout_secs: 2,
            async_processing_timeout_secs: 30,
            async_max_background_workers: 20,
            async_max_background_tasks: 100,
            async_cache_ttl_hours: 1,
            async_persist_interval_secs: 120,
            default_channels: String::new(),
            disk_cache_dir: std::env::temp_dir().join(format!(
                "pansou-orch-test-{:?}",
                std::thread::current().id()
            )),
            async_persist_path: std::env::temp_dir().join("pansou-orch-test-plugin-cache.bin"),
            bind_addr: "127.0.0.1:0".to_string(),
            log_level: "info".to_string(),
        }
    }

    fn result(id: &str, datetime: chrono::DateTime<chrono::Utc>) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: id.to_string(),
            content: String::new(),
            datetime,
            channel: String::new(),
            links: vec![],
        }
    }

    #[tokio::test]
    async fn src_tg_skips_plugin_tasks() {
        let config = Arc::new(test_config());
        let cache = Arc::new(TwoLevelCache::new(config.memory_cache_bytes, &config.disk_cache_dir));
        cache.ensure_dirs().await.unwrap();
        let async_cache = Arc::new(crate::async_plugin::AsyncPluginCache::new(
            crate::async_plugin::AsyncPluginConfig::default(),
        ));

        let channel_adapter: Arc<dyn SourceAdapter> = Arc::new(StubAdapter {
            name: "c1".into(),
            result: result("c1-result", chrono::Utc::now()),
        });
        let plugin_adapter: Arc<dyn SourceAdapter> = Arc::new(StubAdapter {
            name: "p1".into(),
            result: result("p1-result", chrono::Utc::now()),
        });

        let orchestrator = Arc::new(Orchestrator::new(
            config,
            cache,
            async_cache,
            vec![ChannelEntry {
                name: "c1".into(),
                adapter: channel_adapter,
            }],
            vec![PluginEntry {
                name: "p1".into(),
                adapter: plugin_adapter,
            }],
        ));

        let req = SearchRequest {
            keyword: "c1-result".into(),
            source_type: SourceType::Tg,
            result_type: ResultType::All,
            ..Default::default()
        };

        let response = orchestrator.search(req).await;
        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"c1-result"));
        assert!(!ids.contains(&"p1-result"));
    }

    #[tokio::test]
    async fn second_identical_request_hits_cache() {
        let config = Arc::new(test_config());
        let cache = Arc::new(TwoLevelCache::new(config.memory_cache_bytes, &config.disk_cache_dir));
        cache.ensure_dirs().await.unwrap();
        let async_cache = Arc::new(crate::async_plugin::AsyncPluginCache::new(
            crate::async_plugin::AsyncPluginConfig::default(),
        ));

        let channel_adapter: Arc<dyn SourceAdapter> = Arc::new(StubAdapter {
            name: "c1".into(),
            result: result("hit", chrono::Utc::now()),
        });

        let orchestrator = Arc::new(Orchestrator::new(
            config,
            cache,
            async_cache,
            vec![ChannelEntry {
                name: "c1".into(),
                adapter: channel_adapter,
            }],
            vec![],
        ));

        let req = SearchRequest {
            keyword: "hit".into(),
            result_type: ResultType::All,
            ..Default::default()
        };

        let first = orchestrator.search(req.clone()).await;
        assert_eq!(first.total, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = orchestrator.search(req).await;
        assert_eq!(second.total, 1);
    }
}
