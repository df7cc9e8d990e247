//! APA-style and BibTeX rendering of normalized citations.

use std::sync::LazyLock;

use regex::Regex;
use reviewforge_shared::NormalizedCitation;

use crate::{UNKNOWN_AUTHOR, UNKNOWN_VENUE};

/// "et al" as whole words, so names like "Janet Allen" are left alone.
static ET_AL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bet\s+al\b").expect("valid regex"));

/// Render one author name as `Last, F.`.
///
/// Single-token names and names carrying an "et al" marker are returned as
/// given.
pub fn format_author(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return UNKNOWN_AUTHOR.to_string();
    }
    if ET_AL_RE.is_match(name) {
        return name.to_string();
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [single] => (*single).to_string(),
        [first, .., last] => {
            let initial: String = first.chars().next().into_iter().flat_map(char::to_uppercase).collect();
            format!("{last}, {initial}.")
        }
        [] => UNKNOWN_AUTHOR.to_string(),
    }
}

/// Join formatted author names.
///
/// One author stands alone, two are joined with `&`, three or more are
/// comma-separated with `& ` before the last.
pub fn join_authors<S: AsRef<str>>(authors: &[S]) -> String {
    let formatted: Vec<String> = authors
        .iter()
        .map(AsRef::as_ref)
        .filter(|a| !a.trim().is_empty())
        .map(format_author)
        .collect();

    match formatted.as_slice() {
        [] => UNKNOWN_AUTHOR.to_string(),
        [one] => one.clone(),
        [first, second] => format!("{first} & {second}"),
        [init @ .., last] => format!("{}, & {last}", init.join(", ")),
    }
}

/// Reference-list entry: `Authors (Year). *Title*. *Venue*.`
///
/// The venue is left out when it is the unknown-venue placeholder.
pub fn apa_citation(citation: &NormalizedCitation) -> String {
    let authors = join_authors(&citation.authors);
    let mut out = format!("{authors} ({}). *{}*.", citation.year, citation.title);
    if citation.venue != UNKNOWN_VENUE {
        out.push_str(&format!(" *{}*.", citation.venue));
    }
    out
}

/// BibTeX `@article` entry keyed by first-author surname and year.
pub fn bibtex_entry(citation: &NormalizedCitation) -> String {
    let key = format!("{}{}", cite_key_surname(&citation.authors), citation.year);
    let authors = citation.authors.join(" and ");

    format!(
        "@article{{{key},\n  title={{{title}}},\n  author={{{authors}}},\n  year={{{year}}},\n  journal={{{venue}}}\n}}",
        title = citation.title,
        year = citation.year,
        venue = citation.venue,
    )
}

fn cite_key_surname(authors: &[String]) -> String {
    let Some(first) = authors.first() else {
        return "unknown".to_string();
    };

    let without_et_al = match ET_AL_RE.find(first) {
        Some(m) => &first[..m.start()],
        None => first.as_str(),
    };

    let surname: String = without_et_al
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();

    if surname.is_empty() {
        "unknown".to_string()
    } else {
        surname
    }
}
