//! Wire-format DTOs for `/api/search`, decoupled from the domain types in
//! [`crate::model`].
//!
//! Query strings and `application/x-www-form-urlencoded` bodies both flatten
//! into a `HashMap<String, String>` before deserialization (see
//! [`crate::extractors::query::Query`]), so a caller passing `channels` as a
//! repeated query param arrives as a single comma-free last-value-wins
//! string, not a JSON array. [`StringOrList`] absorbs that difference: JSON
//! bodies may send a real array, query/form bodies send a comma-separated
//! string, and both decode to the same `Vec<String>`.

use serde::Deserialize;

use crate::model::{ResultType, SearchRequest, SourceType};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    List(Vec<String>),
    Csv(String),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::List(items) => items,
            StringOrList::Csv(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

fn default_channels() -> Option<StringOrList> {
    None
}

#[derive(Debug, Deserialize)]
pub struct SearchApiRequest {
    #[serde(alias = "kw")]
    pub keyword: Option<String>,

    #[serde(default = "default_channels")]
    pub channels: Option<StringOrList>,

    #[serde(default = "default_channels")]
    pub plugins: Option<StringOrList>,

    #[serde(default)]
    pub conc: Option<usize>,

    #[serde(default)]
    pub refresh: Option<bool>,

    #[serde(rename = "res", default)]
    pub result_type: Option<String>,

    #[serde(rename = "src", default)]
    pub source_type: Option<String>,
}

impl SearchApiRequest {
    /// Validates and converts the wire DTO into the domain [`SearchRequest`]
    /// the orchestrator consumes (full normalisation happens separately,
    /// inside the orchestrator — this step only rejects malformed input).
    pub fn into_domain(self) -> Result<SearchRequest, String> {
        let keyword = self.keyword.unwrap_or_default().trim().to_string();
        if keyword.is_empty() {
            return Err("keyword must not be empty".to_string());
        }

        Ok(SearchRequest {
            keyword,
            channels: self.channels.map(StringOrList::into_vec).unwrap_or_default(),
            plugins: self.plugins.map(StringOrList::into_vec).unwrap_or_default(),
            concurrency: self.conc.unwrap_or(0),
            force_refresh: self.refresh.unwrap_or(false),
            result_type: self
                .result_type
                .map(|s| ResultType::parse(&s))
                .unwrap_or_default(),
            source_type: self
                .source_type
                .map(|s| SourceType::parse(&s))
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_keyword() {
        let req = SearchApiRequest {
            keyword: Some("   ".to_string()),
            channels: None,
            plugins: None,
            conc: None,
            refresh: None,
            result_type: None,
            source_type: None,
        };
        assert!(req.into_domain().is_err());
    }

    #[test]
    fn csv_channels_split_and_trim() {
        let parsed: SearchApiRequest =
            serde_json::from_str(r#"{"keyword":"x","channels":"a, b ,,c"}"#).unwrap();
        let domain = parsed.into_domain().unwrap();
        assert_eq!(domain.channels, vec!["a", "b", "c"]);
    }

    #[test]
    fn json_array_channels_pass_through() {
        let parsed: SearchApiRequest =
            serde_json::from_str(r#"{"keyword":"x","channels":["a","b"]}"#).unwrap();
        let domain = parsed.into_domain().unwrap();
        assert_eq!(domain.channels, vec!["a", "b"]);
    }
}
