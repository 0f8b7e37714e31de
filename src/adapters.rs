//! The uniform interface over channel scrapers and plugin adapters (C6).
//!
//! Both [`tg::TelegramChannelAdapter`] and [`demo_plugin::DemoSearchPlugin`]
//! implement [`SourceAdapter`]; the orchestrator never names a concrete
//! adapter type, only the trait object, so adding a new source means writing
//! an adapter and pushing it into the registry built in `main`/[`crate::app_state`]
//! — the orchestrator itself never needs to change.

use async_trait::async_trait;

use crate::model::SearchResult;

/// A demo JSON-API plugin adapter, included to exercise the registry's
/// extensibility contract end to end.
pub mod demo_plugin;
/// The Telegram-channel HTML scraper adapter.
pub mod tg;

/// A single network-disk source, queryable by keyword.
///
/// `priority` is a tie-breaker hook carried for forward compatibility with a
/// richer ranking scheme; nothing in the current ranking rules consults it
/// today.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable, unique name used for per-plugin cache namespacing and
    /// for matching against a caller-specified plugin list.
    fn name(&self) -> &str;

    /// Higher priority is preferred as a future tie-breaker; unused by the
    /// current ranking rules.
    fn priority(&self) -> i32 {
        0
    }

    /// Fetches results for `keyword`. A single source's failure must never
    /// abort the batch — callers (the pool, or the dual-channel cache
    /// wrapper) treat an `Err` the same as a timeout: the task contributes no
    /// results.
    async fn search(&self, keyword: &str) -> anyhow::Result<Vec<SearchResult>>;
}
