//! Deterministic quality scoring for synthesized drafts.
//!
//! A draft is scored on five dimensions, each worth at most 2 points:
//! structure, length, citations, coverage, and clarity. The total is the
//! plain sum, and a draft passes at [`PASS_THRESHOLD`] or above.
//!
//! Scoring has no side effects and no randomness; the refinement loop relies
//! on identical input producing an identical report.

use std::sync::LazyLock;

use regex::Regex;

use reviewforge_shared::{EvaluationReport, Feedback, SubScores};

/// Minimum total score for a draft to pass.
pub const PASS_THRESHOLD: f64 = 8.0;

/// Upper bound of every sub-score.
pub const DIMENSION_CAP: f64 = 2.0;

/// Topic markers expected somewhere in a well-structured review.
pub const SECTION_MARKERS: [&str; 5] = ["introduction", "theme", "finding", "gap", "conclusion"];

/// Transition and register words that signal academic prose.
pub const ACADEMIC_MARKERS: [&str; 10] = [
    "however",
    "moreover",
    "furthermore",
    "therefore",
    "consequently",
    "research",
    "study",
    "findings",
    "approach",
    "methodology",
];

// ---------------------------------------------------------------------------
// Citation patterns (compiled once)
// ---------------------------------------------------------------------------

/// `(Smith, 2020)` or `(Smith et al., 2020)`.
static PARENTHETICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\([A-Z][a-z]+(?:\s+et\s+al\.)?,\s*\d{4}\)").expect("valid regex")
});

/// `[12]`.
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));

/// `Smith (2020)`.
static NARRATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-z]+\s+\(\d{4}\)").expect("valid regex"));

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Score `draft` against the rubric.
///
/// `expected_titles` drives the coverage check; `None` or an empty slice skips
/// the check and awards full coverage. Blank titles count as mentioned.
pub fn evaluate(draft: &str, expected_titles: Option<&[String]>) -> EvaluationReport {
    let lower = draft.to_lowercase();
    let word_count = draft.split_whitespace().count();
    let mut directives = Vec::new();

    let (structure, structure_fb) = score_structure(&lower, &mut directives);
    let (length, length_fb) = score_length(word_count, &mut directives);
    let (citations, citations_fb) = score_citations(draft, &mut directives);
    let (coverage, coverage_fb) = score_coverage(&lower, expected_titles, &mut directives);
    let (clarity, clarity_fb) = score_clarity(draft, &lower, &mut directives);

    let scores = SubScores {
        structure: cap(structure),
        length: cap(length),
        citations: cap(citations),
        coverage: cap(coverage),
        clarity: cap(clarity),
    };
    let total = scores.sum();

    EvaluationReport {
        scores,
        total,
        feedback: Feedback {
            structure: structure_fb,
            length: length_fb,
            citations: citations_fb,
            coverage: coverage_fb,
            clarity: clarity_fb,
        },
        directives,
        passed: total >= PASS_THRESHOLD,
    }
}

fn cap(score: f64) -> f64 {
    score.clamp(0.0, DIMENSION_CAP)
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

fn score_structure(lower: &str, directives: &mut Vec<String>) -> (f64, String) {
    let missing: Vec<&str> = SECTION_MARKERS
        .iter()
        .copied()
        .filter(|marker| !lower.contains(marker))
        .collect();
    let found = SECTION_MARKERS.len() - missing.len();
    let score = found as f64 / SECTION_MARKERS.len() as f64 * DIMENSION_CAP;

    let total = SECTION_MARKERS.len();
    if score >= 1.5 {
        (score, format!("Good structure: {found}/{total} key sections present"))
    } else {
        directives.push(format!("Add sections discussing: {}", missing.join(", ")));
        (score, format!("Weak structure: only {found}/{total} key sections found"))
    }
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

fn score_length(words: usize, directives: &mut Vec<String>) -> (f64, String) {
    match words {
        1000..=2000 => (2.0, format!("Optimal length: {words} words")),
        800..=999 => {
            directives.push("Expand the discussion to reach at least 1000 words".into());
            (1.5, format!("Slightly short: {words} words (aim for 1000+)"))
        }
        0..=799 => {
            directives.push("Significantly expand the content (at least 800 words needed)".into());
            (1.0, format!("Too short: {words} words (minimum 800)"))
        }
        _ => {
            directives.push("Condense to 1000-2000 words for readability".into());
            (1.5, format!("Too long: {words} words (aim for 1000-2000)"))
        }
    }
}

// ---------------------------------------------------------------------------
// Citations
// ---------------------------------------------------------------------------

/// Count citation-like spans across all three styles.
pub fn count_citations(text: &str) -> usize {
    PARENTHETICAL_RE.find_iter(text).count()
        + NUMBERED_RE.find_iter(text).count()
        + NARRATIVE_RE.find_iter(text).count()
}

fn score_citations(draft: &str, directives: &mut Vec<String>) -> (f64, String) {
    let count = count_citations(draft);
    if count >= 10 {
        (2.0, format!("Strong citation usage: {count} citations"))
    } else if count >= 5 {
        directives.push("Add more citations to support claims".into());
        (1.5, format!("Adequate citations: {count} (aim for 10+)"))
    } else {
        directives.push("Add citations for all key claims (at least 5 needed)".into());
        (1.0, format!("Insufficient citations: {count} (minimum 5)"))
    }
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

fn score_coverage(
    lower: &str,
    expected_titles: Option<&[String]>,
    directives: &mut Vec<String>,
) -> (f64, String) {
    let titles: Vec<String> = expected_titles
        .unwrap_or_default()
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect();

    if titles.is_empty() {
        return (DIMENSION_CAP, "Coverage check skipped (no title list provided)".into());
    }

    let missing: Vec<&String> = titles.iter().filter(|t| !lower.contains(t.as_str())).collect();
    let covered = titles.len() - missing.len();
    let score = covered as f64 / titles.len() as f64 * DIMENSION_CAP;

    if !missing.is_empty() {
        directives.push(format!(
            "Discuss the uncovered sources: {}",
            missing.iter().map(|t| t.as_str()).collect::<Vec<_>>().join("; ")
        ));
    }
    (score, format!("Coverage: {covered}/{} sources mentioned", titles.len()))
}

// ---------------------------------------------------------------------------
// Clarity
// ---------------------------------------------------------------------------

/// Mean words per non-empty sentence, splitting on `.`, `!`, and `?`.
pub fn mean_sentence_length(text: &str) -> f64 {
    let lengths: Vec<usize> = text
        .split(['.', '!', '?'])
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect();

    if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    }
}

fn score_clarity(draft: &str, lower: &str, directives: &mut Vec<String>) -> (f64, String) {
    let avg = mean_sentence_length(draft);
    let markers = ACADEMIC_MARKERS.iter().filter(|m| lower.contains(**m)).count();

    let sentence_score = if (15.0..=25.0).contains(&avg) {
        1.0
    } else if (10.0..30.0).contains(&avg) {
        0.5
    } else {
        0.0
    };
    let register_score = if markers >= 5 {
        1.0
    } else if markers >= 3 {
        0.5
    } else {
        0.0
    };
    let score = sentence_score + register_score;

    if score >= 1.5 {
        return (score, format!("Clear academic writing (avg sentence: {avg:.1} words)"));
    }

    if avg > 25.0 {
        directives.push("Shorten sentences for better readability".into());
    } else if avg < 15.0 {
        directives.push("Use fuller sentences for an academic tone".into());
    }
    if markers < 3 {
        directives.push("Use more transitional phrases and academic language".into());
    }
    (score, format!("Clarity could improve (avg sentence: {avg:.1} words)"))
}
