//! A demo plugin adapter, wired through the async-plugin decorator (C7) like
//! any other plugin, to exercise the "add a source without touching the
//! orchestrator" extensibility property end to end.
//!
//! It speaks a small generic JSON search API (`GET {base_url}?kw=<keyword>`
//! returning `{"items": [...]}`); the base URL is configurable so a
//! deployment can point it at whatever internal indexer it has without a
//! code change.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use super::SourceAdapter;
use crate::model::{Link, LinkType, SearchResult};

pub struct DemoSearchPlugin {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl DemoSearchPlugin {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    items: Vec<ApiItem>,
}

#[derive(Deserialize)]
struct ApiItem {
    id: String,
    title: String,
    #[serde(default)]
    content: String,
    /// Unix seconds; absent/zero means "unknown".
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    links: Vec<ApiLink>,
}

#[derive(Deserialize)]
struct ApiLink {
    url: String,
    #[serde(rename = "type")]
    link_type: String,
    #[serde(default)]
    password: String,
}

#[async_trait]
impl SourceAdapter for DemoSearchPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
        let response: ApiResponse = self
            .client
            .get(&self.base_url)
            .query(&[("kw", keyword)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let results = response
            .items
            .into_iter()
            .map(|item| SearchResult {
                id: item.id,
                title: item.title,
                content: item.content,
                datetime: Utc
                    .timestamp_opt(item.timestamp, 0)
                    .single()
                    .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap()),
                channel: String::new(),
                links: item
                    .links
                    .into_iter()
                    .filter_map(|l| {
                        LinkType::parse(&l.link_type).map(|link_type| Link {
                            url: l.url,
                            link_type,
                            password: l.password,
                        })
                    })
                    .collect(),
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_and_drops_unknown_link_types() {
        let raw = r#"{
            "items": [
                {
                    "id": "1",
                    "title": "t",
                    "content": "c",
                    "timestamp": 1700000000,
                    "links": [
                        {"url": "https://pan.baidu.com/s/x", "type": "baidu", "password": "ab12"},
                        {"url": "https://unknown.example", "type": "whatever-this-is"}
                    ]
                }
            ]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.items.len(), 1);
        let links: Vec<Link> = parsed.items[0]
            .links
            .iter()
            .filter_map(|l| {
                LinkType::parse(&l.link_type).map(|link_type| Link {
                    url: l.url.clone(),
                    link_type,
                    password: l.password.clone(),
                })
            })
            .collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Baidu);
    }
}
