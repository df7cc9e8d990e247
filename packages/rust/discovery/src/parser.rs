//! Discovery payload parser.
//!
//! The discovery collaborator answers with JSON describing candidate
//! documents, usually wrapped in a Markdown code fence and occasionally
//! wrapped in an object:
//! - `[{"title": .., "authors": [..], "year": 2017, "venue": .., "url": ..}]`
//! - `{"papers": [...]}` (also `items` / `results`)
//!
//! Field values are accepted loosely; the payload shape is not.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use reviewforge_shared::{DiscoveredItem, Result, ReviewForgeError};

/// Object keys that may wrap the item array.
const WRAPPER_KEYS: [&str; 3] = ["papers", "items", "results"];

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Body of a ```` ```json ```` fence; an unterminated fence runs to the end.
static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)(?:```|\z)").expect("json fence regex"));

/// Body of a bare ```` ``` ```` fence.
static BARE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)(?:```|\z)").expect("fence regex"));

/// First four-digit run in a free-text year such as `"2019 (preprint)"`.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})\b").expect("year regex"));

// ---------------------------------------------------------------------------
// Raw payload shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Option<RawAuthors>,
    #[serde(default)]
    year: Option<RawYear>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAuthors {
    /// `null` entries are dropped.
    Many(Vec<Option<String>>),
    One(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawYear {
    Number(i64),
    Float(f64),
    Text(String),
}

impl RawYear {
    fn resolve(self) -> Option<i32> {
        match self {
            Self::Number(n) => i32::try_from(n).ok(),
            Self::Float(f) => {
                let whole = f.fract() == 0.0
                    && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&f);
                whole.then_some(f as i32)
            }
            Self::Text(s) => YEAR_RE
                .captures(&s)
                .and_then(|caps| caps[1].parse().ok()),
        }
    }
}

impl RawItem {
    fn into_item(self) -> DiscoveredItem {
        let authors = match self.authors {
            Some(RawAuthors::Many(names)) => names.into_iter().flatten().collect(),
            Some(RawAuthors::One(name)) => vec![name],
            None => Vec::new(),
        };

        let source_url = self.url.as_deref().map(str::trim).and_then(|raw| {
            Url::parse(raw)
                .inspect_err(|e| debug!(url = raw, error = %e, "dropping unparsable source url"))
                .ok()
        });

        DiscoveredItem {
            title: self.title.unwrap_or_default().trim().to_string(),
            authors,
            year: self.year.and_then(RawYear::resolve),
            venue: self.venue.map(|v| v.trim().to_string()),
            source_url,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Strip a surrounding Markdown code fence, preferring a `json` fence.
pub(crate) fn strip_fences(raw: &str) -> &str {
    let captures = if raw.contains("```json") {
        JSON_FENCE_RE.captures(raw)
    } else if raw.contains("```") {
        BARE_FENCE_RE.captures(raw)
    } else {
        None
    };

    captures
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str())
        .trim()
}

/// Parse a discovery payload into items, preserving payload order.
pub(crate) fn parse_payload(raw: &str) -> Result<Vec<DiscoveredItem>> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return Err(ReviewForgeError::parse("discovery payload is empty"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ReviewForgeError::parse(format!("discovery payload is not JSON: {e}")))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| {
                ReviewForgeError::parse("discovery payload object has no item array")
            })?,
        other => {
            return Err(ReviewForgeError::parse(format!(
                "discovery payload must be an array, got {}",
                json_kind(&other)
            )));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            serde_json::from_value::<RawItem>(entry)
                .map(RawItem::into_item)
                .map_err(|e| ReviewForgeError::parse(format!("discovery item {idx}: {e}")))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ITEMS: &str = r#"[
  {"title": "Attention Is All You Need", "authors": ["Ashish Vaswani", "Noam Shazeer"],
   "year": 2017, "venue": "NeurIPS", "url": "https://arxiv.org/pdf/1706.03762.pdf"},
  {"title": "Deep Residual Learning", "authors": ["Kaiming He"], "year": 2016, "venue": "CVPR"}
]"#;

    #[test]
    fn parses_plain_array() {
        let items = parse_payload(TWO_ITEMS).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Attention Is All You Need");
        assert_eq!(items[0].authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(items[0].year, Some(2017));
        assert_eq!(
            items[0].source_url.as_ref().map(Url::as_str),
            Some("https://arxiv.org/pdf/1706.03762.pdf")
        );
        assert_eq!(items[1].title, "Deep Residual Learning");
        assert!(items[1].source_url.is_none());
    }

    #[test]
    fn strips_json_fence_and_prose() {
        let raw = format!("Here are the papers I found:\n\n```json\n{TWO_ITEMS}\n```\nLet me know!");
        let items = parse_payload(&raw).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn strips_bare_fence() {
        let raw = format!("```\n{TWO_ITEMS}\n```");
        assert_eq!(parse_payload(&raw).unwrap().len(), 2);
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let raw = format!("```json\n{TWO_ITEMS}");
        assert_eq!(parse_payload(&raw).unwrap().len(), 2);
    }

    #[test]
    fn accepts_wrapped_array() {
        let raw = format!(r#"{{"results": {TWO_ITEMS}}}"#);
        assert_eq!(parse_payload(&raw).unwrap().len(), 2);
    }

    #[test]
    fn lenient_field_values() {
        let raw = r#"[{"title": " Spaced Title ", "authors": "Devlin et al.",
                       "year": "2019 (NAACL)", "venue": null, "url": "not a url"}]"#;
        let items = parse_payload(raw).unwrap();
        let item = &items[0];
        assert_eq!(item.title, "Spaced Title");
        assert_eq!(item.authors, vec!["Devlin et al."]);
        assert_eq!(item.year, Some(2019));
        assert_eq!(item.venue, None);
        assert_eq!(item.source_url, None);

        let raw = r#"[{"title": "Real Paper One", "authors": ["A B", null, "C D"], "year": 2020.0},
                      {"title": "Real Paper Two", "authors": [null], "year": 2021.5}]"#;
        let items = parse_payload(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].authors, vec!["A B", "C D"]);
        assert_eq!(items[0].year, Some(2020));
        assert!(items[1].authors.is_empty());
        assert_eq!(items[1].year, None);
    }

    #[test]
    fn missing_fields_become_empty() {
        let items = parse_payload("[{}]").unwrap();
        assert_eq!(items[0].title, "");
        assert!(items[0].authors.is_empty());
        assert_eq!(items[0].year, None);
    }

    #[test]
    fn empty_array_is_not_malformed() {
        assert!(parse_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_payloads_rejected() {
        for raw in [
            "",
            "I could not find any papers on that topic.",
            "```json\n```",
            r#"{"papers": "none"}"#,
            r#""just a string""#,
            "[1, 2, 3]",
            r#"[{"title": 42}]"#,
        ] {
            assert!(parse_payload(raw).is_err(), "expected parse error for {raw:?}");
        }
    }
}
