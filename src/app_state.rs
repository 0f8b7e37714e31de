//! Wires config, caches, adapters, and the orchestrator into one shared
//! [`AppState`] published through [`crate::state::set_state`] at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::demo_plugin::DemoSearchPlugin;
use crate::adapters::tg::TelegramChannelAdapter;
use crate::adapters::SourceAdapter;
use crate::async_plugin::{AsyncPluginCache, AsyncPluginConfig};
use crate::cache::TwoLevelCache;
use crate::config::Config;
use crate::orchestrator::{ChannelEntry, Orchestrator, PluginEntry};

pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub async_plugin_cache: Arc<AsyncPluginCache>,
}

/// Builds every long-lived dependency the orchestrator needs and loads
/// whatever survives the async-plugin cache's disk persistence.
pub async fn bootstrap(config: Config) -> anyhow::Result<AppState> {
    let config = Arc::new(config);

    let cache = Arc::new(TwoLevelCache::new(config.memory_cache_bytes, &config.disk_cache_dir));
    cache.ensure_dirs().await?;

    let async_plugin_config = AsyncPluginConfig {
        response_timeout: Duration::from_secs(config.async_response_timeout_secs),
        processing_timeout: Duration::from_secs(config.async_processing_timeout_secs),
        cache_ttl: chrono::Duration::hours(config.async_cache_ttl_hours),
        max_background_workers: config.async_max_background_workers,
        max_background_tasks: config.async_max_background_tasks,
        persist_interval: Duration::from_secs(config.async_persist_interval_secs),
        persist_path: config.async_persist_path.clone(),
        ..AsyncPluginConfig::default()
    };

    let async_plugin_cache = Arc::new(if config.async_plugin_enabled {
        AsyncPluginCache::load(async_plugin_config).await
    } else {
        AsyncPluginCache::new(async_plugin_config)
    });

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.plugin_timeout_secs))
        .user_agent("pansou/0.1")
        .build()?;

    let channels = config
        .default_channel_list()
        .into_iter()
        .map(|name| {
            let adapter: Arc<dyn SourceAdapter> = Arc::new(TelegramChannelAdapter::new(
                name.clone(),
                http_client.clone(),
            ));
            ChannelEntry { name, adapter }
        })
        .collect();

    // Registered here as the plain adapter, not the `AsyncPluginAdapter`
    // decorator: the orchestrator calls `AsyncPluginCache::search` itself for
    // every plugin task, so the cache-and-refresh behavior is applied once,
    // at that call site, rather than here.
    let demo_plugin_name = "demo";
    let demo_plugin_adapter: Arc<dyn SourceAdapter> = Arc::new(DemoSearchPlugin::new(
        demo_plugin_name,
        std::env::var("PANSOU_DEMO_PLUGIN_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:9000/search".to_string()),
        http_client.clone(),
    ));
    let plugins = vec![PluginEntry {
        name: demo_plugin_name.to_string(),
        adapter: demo_plugin_adapter,
    }];

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        cache,
        async_plugin_cache.clone(),
        channels,
        plugins,
    ));

    Ok(AppState {
        config,
        orchestrator,
        async_plugin_cache,
    })
}
