//! Telegram-channel HTML scraper, the concrete channel adapter.
//!
//! Scrapes Telegram's public, unauthenticated channel preview pages
//! (`https://t.me/s/<channel>`), which render the most recent messages as
//! static HTML without requiring the Bot API or a logged-in session. One
//! instance is constructed per configured channel identifier; all instances
//! share a single `reqwest::Client` (connection pooling, one user agent).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use scraper::{Html, Selector};

use super::SourceAdapter;
use crate::model::{Link, LinkType, SearchResult};

pub struct TelegramChannelAdapter {
    channel: String,
    client: reqwest::Client,
}

impl TelegramChannelAdapter {
    pub fn new(channel: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            channel: channel.into(),
            client,
        }
    }
}

#[async_trait]
impl SourceAdapter for TelegramChannelAdapter {
    fn name(&self) -> &str {
        &self.channel
    }

    async fn search(&self, keyword: &str) -> anyhow::Result<Vec<SearchResult>> {
        let url = format!("https://t.me/s/{}?q={}", self.channel, urlencoding::encode(keyword));
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_messages(&body, &self.channel))
    }
}

fn parse_messages(html: &str, channel: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let message_sel = Selector::parse(".tgme_widget_message").unwrap();
    let text_sel = Selector::parse(".tgme_widget_message_text").unwrap();
    let time_sel = Selector::parse("time[datetime]").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let mut results = Vec::new();

    for message in document.select(&message_sel) {
        let id = message
            .value()
            .attr("data-post")
            .unwrap_or_default()
            .to_string();
        if id.is_empty() {
            continue;
        }

        let content = message
            .select(&text_sel)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        let datetime = message
            .select(&time_sel)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap());

        let title = content.lines().next().unwrap_or(&content).to_string();

        let links: Vec<Link> = message
            .select(&link_sel)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(classify_link)
            .collect();

        results.push(SearchResult {
            id,
            title,
            content,
            datetime,
            channel: channel.to_string(),
            links,
        });
    }

    results
}

/// Classifies a raw URL into a [`Link`] by matching on well-known provider
/// domains. Links whose host matches nothing recognized are dropped —
/// unknown-typed links must never reach a `SearchResult`.
fn classify_link(url: &str) -> Option<Link> {
    let label = if url.contains("pan.baidu.com") {
        "baidu"
    } else if url.contains("aliyundrive.com") || url.contains("alipan.com") {
        "aliyun"
    } else if url.contains("pan.xunlei.com") {
        "xunlei"
    } else if url.contains("pan.quark.cn") {
        "quark"
    } else if url.contains("cloud.189.cn") {
        "tianyi"
    } else if url.contains("115.com") || url.contains("115cdn.com") {
        "115"
    } else if url.contains("123pan.com") || url.contains("123684.com") {
        "123"
    } else if url.contains("weiyun.com") {
        "weiyun"
    } else if url.contains("mypikpak.com") {
        "pikpak"
    } else if url.contains("lanzou") {
        "lanzou"
    } else if url.contains("jianguoyun.com") {
        "jianguoyun"
    } else if url.starts_with("ed2k://") {
        "ed2k"
    } else if url.starts_with("magnet:?") {
        "magnet"
    } else if url.contains("drive.uc.cn") {
        "uc"
    } else {
        return None;
    };

    let link_type = LinkType::parse(label)?;
    let password = extract_password(url);

    Some(Link {
        url: url.to_string(),
        link_type,
        password,
    })
}

fn extract_password(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == "pwd")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_providers() {
        assert_eq!(
            classify_link("https://pan.baidu.com/s/abc?pwd=1234")
                .unwrap()
                .link_type,
            LinkType::Baidu
        );
        assert_eq!(
            classify_link("magnet:?xt=urn:btih:abc").unwrap().link_type,
            LinkType::Magnet
        );
    }

    #[test]
    fn drops_unrecognized_links() {
        assert!(classify_link("https://example.com/not-a-drive-link").is_none());
    }

    #[test]
    fn extracts_pwd_query_param() {
        let link = classify_link("https://pan.baidu.com/s/abc?pwd=9x7k").unwrap();
        assert_eq!(link.password, "9x7k");
    }

    #[test]
    fn parses_message_blocks() {
        let html = r#"
            <div class="tgme_widget_message" data-post="chan/123">
                <div class="tgme_widget_message_text">速度与激情 合集 https://pan.baidu.com/s/abc?pwd=1234</div>
                <time datetime="2024-01-02T03:04:05+00:00"></time>
            </div>
        "#;
        let results = parse_messages(html, "chan");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "chan/123");
        assert_eq!(results[0].links.len(), 1);
        assert!(results[0].datetime.timestamp() > 0);
    }
}
