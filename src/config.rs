//! Typed, environment-driven configuration (C11).
//!
//! Every tunable in the crate is read once, here, at process startup. `Config` is
//! built with `envy` against `PANSOU_`-prefixed environment variables and then
//! overridden field-by-field by whatever a `clap` CLI flag was explicitly passed.
//! Nothing downstream re-reads the environment: `main` wraps the result in an
//! `Arc` and publishes it through [`crate::state::set_state`], the same path the
//! router uses for its own shared dependencies.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// Environment-sourced configuration. Field names match the `PANSOU_<FIELD>`
/// environment variable envy looks for (e.g. `memory_cache_bytes` ⇄
/// `PANSOU_MEMORY_CACHE_BYTES`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "Config::default_memory_cache_bytes")]
    pub memory_cache_bytes: u64,

    #[serde(default = "Config::default_cache_ttl_minutes")]
    pub cache_ttl_minutes: i64,

    #[serde(default = "Config::default_plugin_timeout_secs")]
    pub plugin_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub async_plugin_enabled: bool,

    #[serde(default = "Config::default_async_response_timeout_secs")]
    pub async_response_timeout_secs: u64,

    #[serde(default = "Config::default_async_processing_timeout_secs")]
    pub async_processing_timeout_secs: u64,

    #[serde(default = "Config::default_async_max_background_workers")]
    pub async_max_background_workers: usize,

    #[serde(default = "Config::default_async_max_background_tasks")]
    pub async_max_background_tasks: usize,

    #[serde(default = "Config::default_async_cache_ttl_hours")]
    pub async_cache_ttl_hours: i64,

    #[serde(default = "Config::default_async_persist_interval_secs")]
    pub async_persist_interval_secs: u64,

    #[serde(default)]
    pub default_channels: String,

    #[serde(default = "Config::default_disk_cache_dir")]
    pub disk_cache_dir: PathBuf,

    #[serde(default = "Config::default_async_persist_path")]
    pub async_persist_path: PathBuf,

    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "Config::default_log_level")]
    pub log_level: String,
}

impl Config {
    fn default_memory_cache_bytes() -> u64 {
        100 * 1024 * 1024
    }
    fn default_cache_ttl_minutes() -> i64 {
        60
    }
    fn default_plugin_timeout_secs() -> u64 {
        30
    }
    fn default_async_response_timeout_secs() -> u64 {
        2
    }
    fn default_async_processing_timeout_secs() -> u64 {
        30
    }
    fn default_async_max_background_workers() -> usize {
        20
    }
    fn default_async_max_background_tasks() -> usize {
        100
    }
    fn default_async_cache_ttl_hours() -> i64 {
        1
    }
    fn default_async_persist_interval_secs() -> u64 {
        120
    }
    fn default_disk_cache_dir() -> PathBuf {
        PathBuf::from("./data/disk_cache")
    }
    fn default_async_persist_path() -> PathBuf {
        PathBuf::from("./data/plugin_cache.bin")
    }
    fn default_bind_addr() -> String {
        "127.0.0.1:8080".to_string()
    }
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Loads configuration from `PANSOU_*` environment variables (with process
    /// defaults for anything unset), then applies any CLI overrides.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut cfg: Config = envy::prefixed("PANSOU_")
            .from_env()
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

        if let Some(addr) = &cli.bind {
            cfg.bind_addr = addr.clone();
        }
        if let Some(level) = &cli.log_level {
            cfg.log_level = level.clone();
        }
        if let Some(channels) = &cli.channels {
            cfg.default_channels = channels.clone();
        }

        Ok(cfg)
    }

    /// The default channel list as a normalised, non-empty-trimmed list.
    pub fn default_channel_list(&self) -> Vec<String> {
        self.default_channels
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// CLI overrides layered on top of the environment-sourced [`Config`].
#[derive(Debug, Parser)]
#[command(name = "pansou", about = "Federated network-disk search aggregator")]
pub struct Cli {
    /// Override the HTTP bind address (defaults to `PANSOU_BIND_ADDR` or 127.0.0.1:8080).
    #[arg(long, env = "PANSOU_BIND_ADDR_OVERRIDE")]
    pub bind: Option<String>,

    /// Override the tracing log level/filter (e.g. "info", "pansou=debug").
    #[arg(long, env = "PANSOU_LOG_LEVEL_OVERRIDE")]
    pub log_level: Option<String>,

    /// Override the default channel list (comma-separated).
    #[arg(long, env = "PANSOU_CHANNELS_OVERRIDE")]
    pub channels: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_list_drops_empty_entries() {
        let mut cfg = test_config();
        cfg.default_channels = "a, ,b,".to_string();
        assert_eq!(cfg.default_channel_list(), vec!["a".to_string(), "b".to_string()]);
    }

    fn test_config() -> Config {
        Config {
            cache_enabled: true,
            memory_cache_bytes: Config::default_memory_cache_bytes(),
            cache_ttl_minutes: Config::default_cache_ttl_minutes(),
            plugin_timeout_secs: Config::default_plugin_timeout_secs(),
            async_plugin_enabled: true,
            async_response_timeout_secs: Config::default_async_response_timeout_secs(),
            async_processing_timeout_secs: Config::default_async_processing_timeout_secs(),
            async_max_background_workers: Config::default_async_max_background_workers(),
            async_max_background_tasks: Config::default_async_max_background_tasks(),
            async_cache_ttl_hours: Config::default_async_cache_ttl_hours(),
            async_persist_interval_secs: Config::default_async_persist_interval_secs(),
            default_channels: String::new(),
            disk_cache_dir: Config::default_disk_cache_dir(),
            async_persist_path: Config::default_async_persist_path(),
            bind_addr: Config::default_bind_addr(),
            log_level: Config::default_log_level(),
        }
    }
}
