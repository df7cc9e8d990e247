//! Discovery payload handling.
//!
//! The discovery collaborator is a text generator, so its answer has to be
//! parsed defensively. A payload that parses yields the discovered items in
//! ranking order; a malformed one is replaced by a small built-in sample so a
//! run can still complete in degraded mode.

mod parser;

use reviewforge_shared::{DiscoveredItem, Result};
use tracing::{debug, warn};
use url::Url;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a raw discovery payload.
///
/// Accepts a JSON array of items, optionally inside a Markdown code fence or
/// wrapped as `{"papers": [...]}`. Returns a parse error for anything else.
pub fn parse_discovery_payload(raw: &str) -> Result<Vec<DiscoveredItem>> {
    parser::parse_payload(raw)
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// The built-in sample used when discovery output is malformed.
pub fn fallback_items() -> Vec<DiscoveredItem> {
    vec![
        sample(
            "Attention Is All You Need",
            "Vaswani et al.",
            2017,
            "NeurIPS",
            "https://arxiv.org/pdf/1706.03762.pdf",
        ),
        sample(
            "BERT: Pre-training of Deep Bidirectional Transformers",
            "Devlin et al.",
            2019,
            "NAACL",
            "https://arxiv.org/pdf/1810.04805.pdf",
        ),
    ]
}

fn sample(title: &str, author: &str, year: i32, venue: &str, url: &str) -> DiscoveredItem {
    DiscoveredItem {
        title: title.to_string(),
        authors: vec![author.to_string()],
        year: Some(year),
        venue: Some(venue.to_string()),
        source_url: Url::parse(url).ok(),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Items selected from one discovery answer.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredSet {
    /// At most `max_items` entries, in ranking order.
    pub items: Vec<DiscoveredItem>,
    /// The payload was malformed and [`fallback_items`] was used instead.
    pub degraded: bool,
}

/// Parse `raw`, falling back to the built-in sample on malformed output, and
/// truncate to `max_items`.
pub fn resolve_items(raw: &str, max_items: usize) -> DiscoveredSet {
    let (mut items, degraded) = match parse_discovery_payload(raw) {
        Ok(items) => (items, false),
        Err(e) => {
            warn!(error = %e, "discovery output malformed, using built-in fallback list");
            (fallback_items(), true)
        }
    };

    if items.len() > max_items {
        debug!(found = items.len(), max_items, "truncating discovered items");
        items.truncate(max_items);
    }

    DiscoveredSet { items, degraded }
}
