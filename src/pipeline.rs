//! The filter/rank/merge pipeline (C8): keyword match, multi-tier ordering,
//! per-URL dedup and provider grouping.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{LinkType, MergedLink, ResultType, SearchResponse, SearchResult};

/// Highest-priority first.
const PRIORITY_KEYWORDS: [&str; 7] = ["全", "合集", "系列", "完", "最新", "附", "花园墙外"];

/// `len(list) - index_of_first_match`, or 0 if no keyword matches. Matching
/// is substring, case-insensitive.
fn priority_score(title: &str) -> usize {
    let lower = title.to_lowercase();
    for (index, keyword) in PRIORITY_KEYWORDS.iter().enumerate() {
        if lower.contains(&keyword.to_lowercase()) {
            return PRIORITY_KEYWORDS.len() - index;
        }
    }
    0
}

/// Keyword filter: every whitespace-separated token of the lowercased
/// keyword must match, where "pwd" has special substring/URL-password rules.
fn keyword_filter(results: Vec<SearchResult>, keyword: &str) -> Vec<SearchResult> {
    let tokens: Vec<String> = keyword
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return results;
    }

    results
        .into_iter()
        .filter(|r| tokens.iter().all(|token| token_matches(r, token)))
        .collect()
}

fn token_matches(result: &SearchResult, token: &str) -> bool {
    let title = result.title.to_lowercase();
    let content = result.content.to_lowercase();

    if token == "pwd" {
        let text_hit = title.contains("pwd") || content.contains("pwd");
        let url_hit = result
            .links
            .iter()
            .any(|l| l.url.to_lowercase().contains("pwd="));
        return text_hit || url_hit;
    }

    title.contains(token) || content.contains(token)
}

/// Total order from the three-branch ranking rule: unknown-datetime results
/// sort last, same-day results rank by priority keyword then recency, and
/// everything older just sorts newest-first.
fn rank_cmp(a: &(SearchResult, usize), b: &(SearchResult, usize)) -> Ordering {
    let (ra, sa) = a;
    let (rb, sb) = b;

    let a_zero = ra.has_unknown_datetime();
    let b_zero = rb.has_unknown_datetime();

    if a_zero && b_zero {
        return sb.cmp(sa).then_with(|| ra.title.cmp(&rb.title));
    }
    if a_zero != b_zero {
        // The zero-datetime result sorts after.
        return if a_zero { Ordering::Greater } else { Ordering::Less };
    }

    let delta_days = (ra.datetime - rb.datetime).num_seconds().unsigned_abs() as f64 / 86_400.0;

    if delta_days <= 1.0 {
        sb.cmp(sa).then_with(|| rb.datetime.cmp(&ra.datetime))
    } else {
        // Both the (1, 30] and (30, inf) bands use "newer first".
        rb.datetime.cmp(&ra.datetime)
    }
}

fn rank(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut scored: Vec<(SearchResult, usize)> = results
        .into_iter()
        .map(|r| {
            let score = priority_score(&r.title);
            (r, score)
        })
        .collect();
    scored.sort_by(rank_cmp);
    scored.into_iter().map(|(r, _)| r).collect()
}

/// Results eligible for the `results` view: a non-zero datetime, or a
/// title that scores against the priority keywords.
fn results_view_filter(ranked: &[SearchResult]) -> Vec<SearchResult> {
    ranked
        .iter()
        .filter(|r| !r.has_unknown_datetime() || priority_score(&r.title) > 0)
        .cloned()
        .collect()
}

/// Per-provider merge: across all ranked results, keep one
/// [`MergedLink`] per distinct URL (the occurrence with the newest
/// datetime wins), grouped by link type and sorted newest-first within
/// each group.
fn merge_links(ranked: &[SearchResult]) -> HashMap<LinkType, Vec<MergedLink>> {
    struct Candidate {
        link_type: LinkType,
        merged: MergedLink,
    }

    let mut by_url: HashMap<String, Candidate> = HashMap::new();

    for result in ranked {
        for link in &result.links {
            let candidate = MergedLink {
                url: link.url.clone(),
                password: link.password.clone(),
                note: result.title.clone(),
                datetime: result.datetime,
            };

            match by_url.get(&link.url) {
                Some(existing) if existing.merged.datetime >= candidate.datetime => {}
                _ => {
                    by_url.insert(
                        link.url.clone(),
                        Candidate {
                            link_type: link.link_type,
                            merged: candidate,
                        },
                    );
                }
            }
        }
    }

    let mut grouped: HashMap<LinkType, Vec<MergedLink>> = HashMap::new();
    for candidate in by_url.into_values() {
        grouped.entry(candidate.link_type).or_default().push(candidate.merged);
    }

    for group in grouped.values_mut() {
        group.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    }

    grouped
}

/// Builds the full, unprojected response (both `results` and
/// `mergedByType` populated) that gets cached. `total` here always uses the
/// `filteredForResults` count; [`project`] recomputes it for the `merge`
/// view when a caller actually requests that projection.
pub fn build(raw: Vec<SearchResult>, keyword: &str) -> SearchResponse {
    let filtered = keyword_filter(raw, keyword);
    let ranked = rank(filtered);
    let filtered_for_results = results_view_filter(&ranked);
    let merged_by_type = merge_links(&ranked);

    SearchResponse {
        total: filtered_for_results.len(),
        results: filtered_for_results,
        merged_by_type,
    }
}

/// Projects a full response down to the shape dictated by `view`.
pub fn project(full: SearchResponse, view: ResultType) -> SearchResponse {
    match view {
        ResultType::Results => SearchResponse {
            total: full.results.len(),
            results: full.results,
            merged_by_type: HashMap::new(),
        },
        ResultType::MergedByType => {
            let total = full.merged_by_type.values().map(|v| v.len()).sum();
            SearchResponse {
                total,
                results: Vec::new(),
                merged_by_type: full.merged_by_type,
            }
        }
        ResultType::All => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn result(title: &str, datetime: chrono::DateTime<Utc>) -> SearchResult {
        SearchResult {
            id: title.to_string(),
            title: title.to_string(),
            content: String::new(),
            datetime,
            channel: String::new(),
            links: vec![],
        }
    }

    #[test]
    fn ranking_orders_by_priority_within_one_day_window() {
        let now = Utc::now();
        let a = result("速度与激情", now);
        let b = result("速度与激情 合集", now - ChronoDuration::hours(2));
        let c = result("速度与激情 全", chrono::DateTime::<Utc>::from_timestamp(0, 0).unwrap());

        let ranked = rank(vec![a, b, c]);
        let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["速度与激情 合集", "速度与激情", "速度与激情 全"]);
    }

    #[test]
    fn pwd_token_matches_url_query_param() {
        let mut r = result("speed fury", Utc::now());
        r.content = "no password mentioned".to_string();
        r.links = vec![crate::model::Link {
            url: "https://pan.example.com/s/abc?pwd=xy12".to_string(),
            link_type: LinkType::Others,
            password: "xy12".to_string(),
        }];

        let filtered = keyword_filter(vec![r], "speed fury pwd");
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn keyword_filter_requires_every_token() {
        let r = result("speed demon", Utc::now());
        let filtered = keyword_filter(vec![r], "speed fury");
        assert!(filtered.is_empty());
    }

    #[test]
    fn view_projection_totals() {
        let mut full = SearchResponse {
            total: 5,
            results: (0..5).map(|i| result(&i.to_string(), Utc::now())).collect(),
            merged_by_type: HashMap::new(),
        };
        full.merged_by_type.insert(
            LinkType::Baidu,
            (0..12)
                .map(|i| MergedLink {
                    url: format!("u{i}"),
                    password: String::new(),
                    note: String::new(),
                    datetime: Utc::now(),
                })
                .collect(),
        );

        let results_view = project(full.clone(), ResultType::Results);
        assert_eq!(results_view.total, 5);

        let merge_view = project(full.clone(), ResultType::MergedByType);
        assert_eq!(merge_view.total, 12);

        let all_view = project(full, ResultType::All);
        assert_eq!(all_view.total, 5);
        assert!(!all_view.merged_by_type.is_empty());
    }

    #[test]
    fn merged_links_dedup_by_url_keep_newest() {
        let now = Utc::now();
        let mut older = result("old", now - ChronoDuration::days(2));
        older.links = vec![crate::model::Link {
            url: "https://pan.example.com/s/shared".to_string(),
            link_type: LinkType::Baidu,
            password: String::new(),
        }];
        let mut newer = result("new", now);
        newer.links = vec![crate::model::Link {
            url: "https://pan.example.com/s/shared".to_string(),
            link_type: LinkType::Baidu,
            password: String::new(),
        }];

        let grouped = merge_links(&[older, newer]);
        let group = grouped.get(&LinkType::Baidu).unwrap();
        assert_eq!(group.len(), 1);
        assert_eq!(group[0].note, "new");
    }
}
