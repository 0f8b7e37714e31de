//! Domain types shared by the cache, pipeline, and orchestrator.
//!
//! These are the crate's "real" data — as opposed to the wire-format DTOs in
//! [`crate::api::dto`], which exist only to decode/encode HTTP traffic and convert
//! into/out of these types at the handler boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalised search request, as consumed by the orchestrator (C9).
///
/// Constructed from a [`crate::api::dto::SearchApiRequest`] by the HTTP layer, or
/// directly by callers inside the crate (tests, the CLI). `channels` and `plugins`
/// are already exclusive per [`SourceType`] by the time this reaches the
/// orchestrator — see [`SearchRequest::normalize`].
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub keyword: String,
    pub channels: Vec<String>,
    pub plugins: Vec<String>,
    pub concurrency: usize,
    pub force_refresh: bool,
    pub result_type: ResultType,
    pub source_type: SourceType,
}

impl SearchRequest {
    /// Applies the mutual-exclusion rule: `src=tg` drops any plugin
    /// list, `src=plugin` drops any channel list.
    pub fn normalize(mut self) -> Self {
        self.keyword = self.keyword.trim().to_string();
        match self.source_type {
            SourceType::Tg => self.plugins.clear(),
            SourceType::Plugin => self.channels.clear(),
            SourceType::All => {}
        }
        self
    }
}

/// Which result view the caller wants projected out of a [`SearchResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    All,
    Results,
    #[default]
    MergedByType,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::All => "all",
            ResultType::Results => "results",
            ResultType::MergedByType => "merge",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "all" => ResultType::All,
            "results" => ResultType::Results,
            _ => ResultType::MergedByType,
        }
    }
}

/// Which class of source the caller wants queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    #[default]
    All,
    Tg,
    Plugin,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::All => "all",
            SourceType::Tg => "tg",
            SourceType::Plugin => "plugin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "tg" => SourceType::Tg,
            "plugin" => SourceType::Plugin,
            _ => SourceType::All,
        }
    }
}

/// The kind of network-disk a [`Link`] points at. `Others` is the catch-all for
/// link types the scrapers/plugins don't recognize; unknown-typed links never
/// make it this far (see [`crate::pipeline`]), so `Others` is for links whose type
/// is recognized but not individually enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Baidu,
    Aliyun,
    Xunlei,
    Quark,
    Tianyi,
    #[serde(rename = "115")]
    O115,
    #[serde(rename = "123")]
    O123,
    Weiyun,
    Pikpak,
    Lanzou,
    Jianguoyun,
    Mobile,
    Chengtong,
    Ed2k,
    Magnet,
    Uc,
    Others,
}

impl LinkType {
    /// Parses a provider label as produced by a channel scraper or plugin.
    /// Returns `None` for labels the pipeline does not recognize at all — such
    /// links are dropped rather than falling into [`LinkType::Others`].
    pub fn parse(label: &str) -> Option<Self> {
        Some(match label.to_ascii_lowercase().as_str() {
            "baidu" => LinkType::Baidu,
            "aliyun" => LinkType::Aliyun,
            "xunlei" => LinkType::Xunlei,
            "quark" => LinkType::Quark,
            "tianyi" => LinkType::Tianyi,
            "115" => LinkType::O115,
            "123" => LinkType::O123,
            "weiyun" => LinkType::Weiyun,
            "pikpak" => LinkType::Pikpak,
            "lanzou" => LinkType::Lanzou,
            "jianguoyun" => LinkType::Jianguoyun,
            "mobile" => LinkType::Mobile,
            "chengtong" => LinkType::Chengtong,
            "ed2k" => LinkType::Ed2k,
            "magnet" => LinkType::Magnet,
            "uc" => LinkType::Uc,
            "others" => LinkType::Others,
            _ => return None,
        })
    }
}

/// A single network-disk link extracted from a [`SearchResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub password: String,
}

/// One raw item returned by a channel scraper or plugin, before filtering/ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Zero (`DateTime::UNIX_EPOCH`) means "unknown".
    pub datetime: DateTime<Utc>,
    pub channel: String,
    pub links: Vec<Link>,
}

impl SearchResult {
    pub fn has_unknown_datetime(&self) -> bool {
        self.datetime.timestamp() == 0
    }
}

/// The per-URL canonical record produced by the provider-grouping step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedLink {
    pub url: String,
    pub password: String,
    pub note: String,
    pub datetime: DateTime<Utc>,
}

/// The response body of a search, before view projection strips fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    pub total: usize,
    pub results: Vec<SearchResult>,
    #[serde(rename = "mergedByType")]
    pub merged_by_type: HashMap<LinkType, Vec<MergedLink>>,
}

/// One slot in the async-plugin cache (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub results: Vec<SearchResult>,
    pub timestamp: DateTime<Utc>,
    pub complete: bool,
    pub last_access: DateTime<Utc>,
    pub access_count: u64,
}

impl CachedEntry {
    pub fn fresh(results: Vec<SearchResult>, complete: bool) -> Self {
        let now = Utc::now();
        Self {
            results,
            timestamp: now,
            complete,
            last_access: now,
            access_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
        self.access_count += 1;
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.timestamp
    }

    pub fn idle(&self) -> chrono::Duration {
        Utc::now() - self.last_access
    }

    /// `accessCount / (idleSeconds² · ageSeconds)`. Higher retains.
    pub fn eviction_score(&self) -> f64 {
        let idle = self.idle().num_seconds().max(1) as f64;
        let age = self.age().num_seconds().max(1) as f64;
        self.access_count as f64 / (idle * idle * age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_plugins_for_tg_source() {
        let req = SearchRequest {
            keyword: "  movie  ".into(),
            channels: vec!["c1".into()],
            plugins: vec!["x".into()],
            source_type: SourceType::Tg,
            ..Default::default()
        }
        .normalize();

        assert_eq!(req.keyword, "movie");
        assert!(req.plugins.is_empty());
        assert_eq!(req.channels, vec!["c1".to_string()]);
    }

    #[test]
    fn normalize_drops_channels_for_plugin_source() {
        let req = SearchRequest {
            keyword: "movie".into(),
            channels: vec!["c1".into()],
            plugins: vec!["x".into()],
            source_type: SourceType::Plugin,
            ..Default::default()
        }
        .normalize();

        assert!(req.channels.is_empty());
        assert_eq!(req.plugins, vec!["x".to_string()]);
    }

    #[test]
    fn eviction_score_rewards_access_count() {
        let now = Utc::now();
        let low = CachedEntry {
            results: vec![],
            timestamp: now - chrono::Duration::seconds(100),
            complete: true,
            last_access: now - chrono::Duration::seconds(10),
            access_count: 1,
        };
        let high = CachedEntry {
            access_count: 5,
            ..low.clone()
        };
        assert!(high.eviction_score() > low.eviction_score());
    }
}
