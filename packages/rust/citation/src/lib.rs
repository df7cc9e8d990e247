//! Citation metadata normalization.
//!
//! Discovery output is untrusted: titles go missing, author lists come back
//! empty, years fall outside any plausible range. [`normalize`] repairs each
//! field independently and records what it changed, so formatting code
//! downstream never sees an out-of-range value. It never fails.
//!
//! APA and BibTeX rendering live in [`format`] and operate only on
//! already-normalized records.

pub mod format;

use chrono::Datelike;
use tracing::debug;

use reviewforge_shared::{DiscoveredItem, NormalizedCitation};

pub use format::{apa_citation, bibtex_entry, format_author, join_authors};

/// Earliest accepted publication year.
pub const MIN_YEAR: i32 = 1900;

/// Latest accepted publication year.
pub const MAX_YEAR: i32 = 2030;

/// Replacement for titles shorter than five characters.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Replacement author when none survive trimming.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Replacement for venues shorter than two characters.
pub const UNKNOWN_VENUE: &str = "Unknown Venue";

const MIN_TITLE_CHARS: usize = 5;
const MIN_VENUE_CHARS: usize = 2;

/// Validate and repair a bibliographic record.
///
/// Missing or out-of-range years are replaced with the current calendar year.
pub fn normalize<S: AsRef<str>>(
    title: Option<&str>,
    authors: &[S],
    year: Option<i32>,
    venue: Option<&str>,
) -> NormalizedCitation {
    normalize_with_fallback_year(title, authors, year, venue, current_year())
}

/// Normalize the metadata carried by a discovered item.
pub fn normalize_item(item: &DiscoveredItem) -> NormalizedCitation {
    normalize(
        Some(item.title.as_str()),
        &item.authors,
        item.year,
        item.venue.as_deref(),
    )
}

/// [`normalize`] with an explicit replacement year.
///
/// The replacement is itself clamped into `[MIN_YEAR, MAX_YEAR]`.
pub fn normalize_with_fallback_year<S: AsRef<str>>(
    title: Option<&str>,
    authors: &[S],
    year: Option<i32>,
    venue: Option<&str>,
    fallback_year: i32,
) -> NormalizedCitation {
    let mut issues = Vec::new();

    let title = match title.map(str::trim) {
        Some(t) if t.chars().count() >= MIN_TITLE_CHARS => t.to_string(),
        _ => {
            issues.push("Title too short or missing".to_string());
            UNKNOWN_TITLE.to_string()
        }
    };

    let mut kept: Vec<String> = authors
        .iter()
        .map(|a| a.as_ref().trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if kept.is_empty() {
        if authors.is_empty() {
            issues.push("No authors provided".to_string());
        } else {
            issues.push("Author names were all blank".to_string());
        }
        kept.push(UNKNOWN_AUTHOR.to_string());
    }

    let year = match year {
        Some(y) if (MIN_YEAR..=MAX_YEAR).contains(&y) => y,
        Some(y) => {
            issues.push(format!("Invalid year: {y}"));
            fallback_year.clamp(MIN_YEAR, MAX_YEAR)
        }
        None => {
            issues.push("Year missing".to_string());
            fallback_year.clamp(MIN_YEAR, MAX_YEAR)
        }
    };

    let venue = match venue.map(str::trim) {
        Some(v) if v.chars().count() >= MIN_VENUE_CHARS => v.to_string(),
        _ => {
            issues.push("Venue missing or too short".to_string());
            UNKNOWN_VENUE.to_string()
        }
    };

    if !issues.is_empty() {
        debug!(?issues, "citation metadata repaired");
    }

    NormalizedCitation {
        title,
        authors: kept,
        year,
        venue,
        issues,
    }
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}
