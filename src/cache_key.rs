//! Deterministic fingerprint of a normalised search request (C1).
//!
//! The digest only needs to be stable and fast, not adversary-resistant — BLAKE3
//! truncated to 16 bytes (32 hex characters) gives plenty of collision margin for
//! cache-key use while being considerably cheaper than MD5/SHA1 at this crate's
//! request volumes.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Sentinel substituted for an empty or full list.
const ALL: &str = "all";
/// Sentinel substituted for the plugin list when `sourceType == "tg"`.
const NONE: &str = "none";

/// Memoised digest of the full registered-plugin set, recomputed whenever the
/// registry composition changes (callers pass the current set each time; this
/// cache only short-circuits repeated calls with the same set via its capacity-1
/// last-seen check).
static PLUGIN_SET_DIGEST_CACHE: Lazy<parking_lot::Mutex<Option<(Vec<String>, String)>>> =
    Lazy::new(|| parking_lot::Mutex::new(None));

/// Computes the cache fingerprint for a search request, applying the
/// normalisation rules in order.
///
/// `all_plugins` is the full set of currently registered plugin names, used to
/// detect "caller specified every plugin" and fold it into the `all` sentinel.
pub fn compute(
    keyword: &str,
    channels: &[String],
    result_type: &str,
    source_type: &str,
    plugins: &[String],
    all_plugins: &[String],
) -> String {
    let keyword = keyword.trim().to_lowercase();

    let channels = normalize_list(channels, ALL);

    let result_type = if result_type.is_empty() {
        ALL.to_string()
    } else {
        result_type.to_string()
    };

    let source_type = if source_type.is_empty() {
        ALL.to_string()
    } else {
        source_type.to_string()
    };

    let plugins = if source_type == "tg" {
        NONE.to_string()
    } else {
        normalize_plugin_list(plugins, all_plugins)
    };

    let fields = format!(
        "{}:{}:{}:{}:{}",
        keyword, channels, result_type, source_type, plugins
    );
    digest(&fields)
}

fn normalize_list(items: &[String], empty_sentinel: &str) -> String {
    let mut cleaned: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if cleaned.is_empty() {
        return empty_sentinel.to_string();
    }
    cleaned.sort_unstable();
    cleaned.join(",")
}

fn normalize_plugin_list(plugins: &[String], all_plugins: &[String]) -> String {
    let cleaned: HashSet<&str> = plugins
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if cleaned.is_empty() {
        return ALL.to_string();
    }

    let full: HashSet<&str> = all_plugins.iter().map(String::as_str).collect();
    if !full.is_empty() && cleaned == full {
        return ALL.to_string();
    }

    let mut sorted: Vec<&str> = cleaned.into_iter().collect();
    sorted.sort_unstable();

    let mut cache = PLUGIN_SET_DIGEST_CACHE.lock();
    let key: Vec<String> = sorted.iter().map(|s| s.to_string()).collect();
    if let Some((last_key, last_value)) = cache.as_ref() {
        if last_key == &key {
            return last_value.clone();
        }
    }
    let joined = sorted.join(",");
    *cache = Some((key, joined.clone()));
    joined
}

fn digest(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    hex_encode(&hash.as_bytes()[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugins() -> Vec<String> {
        vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]
    }

    #[test]
    fn deterministic_for_identical_input() {
        let a = compute("movie", &[], "merge", "all", &[], &plugins());
        let b = compute("movie", &[], "merge", "all", &[], &plugins());
        assert_eq!(a, b);
    }

    #[test]
    fn case_and_whitespace_insensitive_keyword() {
        let a = compute("Movie", &[], "merge", "all", &[], &plugins());
        let b = compute("  movie  ", &[], "merge", "all", &[], &plugins());
        assert_eq!(a, b);
    }

    #[test]
    fn channel_order_does_not_matter() {
        let a = compute(
            "movie",
            &["c2".to_string(), "c1".to_string()],
            "merge",
            "all",
            &[],
            &plugins(),
        );
        let b = compute(
            "movie",
            &["c1".to_string(), "c2".to_string()],
            "merge",
            "all",
            &[],
            &plugins(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn empty_string_entries_are_dropped() {
        let a = compute(
            "movie",
            &["c1".to_string(), "".to_string()],
            "merge",
            "all",
            &[],
            &plugins(),
        );
        let b = compute("movie", &["c1".to_string()], "merge", "all", &[], &plugins());
        assert_eq!(a, b);
    }

    #[test]
    fn full_plugin_set_collapses_to_sentinel() {
        let a = compute("movie", &[], "merge", "all", &plugins(), &plugins());
        let b = compute("movie", &[], "merge", "all", &[], &plugins());
        assert_eq!(a, b);
    }

    #[test]
    fn tg_source_ignores_plugin_list() {
        let a = compute(
            "movie",
            &[],
            "merge",
            "tg",
            &["alpha".to_string()],
            &plugins(),
        );
        let b = compute("movie", &[], "merge", "tg", &[], &plugins());
        assert_eq!(a, b);
    }

    #[test]
    fn different_keywords_produce_different_digests() {
        let a = compute("movie", &[], "merge", "all", &[], &plugins());
        let b = compute("series", &[], "merge", "all", &[], &plugins());
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_32_hex_chars() {
        let a = compute("movie", &[], "merge", "all", &[], &plugins());
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
