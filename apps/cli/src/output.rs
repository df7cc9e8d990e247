//! Writing a finished review to disk.

use std::path::{Path, PathBuf};

use reviewforge_citation::{apa_citation, bibtex_entry};
use reviewforge_core::ReviewOutcome;
use reviewforge_shared::{Result, ReviewForgeError};

/// Longest slug taken from the topic.
const MAX_SLUG_CHARS: usize = 30;

/// Files produced for one review.
#[derive(Debug)]
pub(crate) struct WrittenReview {
    pub markdown: PathBuf,
    pub bibtex: PathBuf,
}

/// File-name-safe form of a topic: alphanumerics kept, runs of anything else
/// collapsed to `_`.
pub(crate) fn slugify(topic: &str) -> String {
    let mut slug = String::new();
    for c in topic.trim().chars() {
        if c.is_alphanumeric() || c == '-' {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
        if slug.chars().count() >= MAX_SLUG_CHARS {
            break;
        }
    }

    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

pub(crate) fn render_markdown(outcome: &ReviewOutcome) -> String {
    let mut out = format!(
        "# Literature Review: {}\n\n**Generated by reviewforge**\n\n",
        outcome.topic
    );
    out.push_str(outcome.draft.body.trim());
    out.push_str("\n\n");

    let citations = outcome.citations();
    if !citations.is_empty() {
        out.push_str("## References\n\n");
        for citation in citations {
            out.push_str(&format!("- {}\n", apa_citation(citation)));
        }
        out.push('\n');
    }

    let gate = if outcome.passed() {
        "quality gate passed"
    } else {
        "quality gate not reached"
    };
    out.push_str("---\n");
    out.push_str(&format!(
        "*Quality score {:.1}/10 after {} evaluation(s), {gate}.*\n",
        outcome.report.total, outcome.evaluations
    ));
    out.push_str(&format!(
        "*Based on analysis of {} academic papers.*\n",
        outcome.items.len()
    ));
    out
}

pub(crate) fn render_bibtex(outcome: &ReviewOutcome) -> String {
    outcome
        .citations()
        .into_iter()
        .map(bibtex_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Write `literature_review_<slug>.md` and its `.bib` sibling into `dir`.
pub(crate) fn write_review(outcome: &ReviewOutcome, dir: &Path) -> Result<WrittenReview> {
    std::fs::create_dir_all(dir).map_err(|e| ReviewForgeError::io(dir, e))?;

    let stem = format!("literature_review_{}", slugify(&outcome.topic));
    let markdown = dir.join(format!("{stem}.md"));
    let bibtex = dir.join(format!("{stem}.bib"));

    std::fs::write(&markdown, render_markdown(outcome))
        .map_err(|e| ReviewForgeError::io(&markdown, e))?;
    std::fs::write(&bibtex, render_bibtex(outcome)).map_err(|e| ReviewForgeError::io(&bibtex, e))?;

    tracing::info!(path = %markdown.display(), "review written");
    Ok(WrittenReview { markdown, bibtex })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use reviewforge_citation::normalize_item;
    use reviewforge_core::LoopExit;
    use reviewforge_evaluator::evaluate;
    use reviewforge_shared::{AnalysisOutcome, AnalysisResult, DiscoveredItem, Draft, RunId};

    fn result(title: &str, author: &str, ok: bool) -> AnalysisResult {
        let item = DiscoveredItem {
            title: title.into(),
            authors: vec![author.into()],
            year: Some(2017),
            venue: Some("NeurIPS".into()),
            source_url: None,
        };
        let outcome = if ok {
            AnalysisOutcome::Analyzed {
                body: "analysis".into(),
            }
        } else {
            AnalysisOutcome::Tombstone {
                reason: "timeout".into(),
            }
        };
        AnalysisResult {
            citation: normalize_item(&item),
            item,
            outcome,
        }
    }

    fn outcome(topic: &str) -> ReviewOutcome {
        let analyses = vec![
            result("Attention Is All You Need", "Ashish Vaswani", true),
            result("A Paper That Timed Out", "Jane Doe", false),
        ];
        let body = "The introduction of self-attention (Vaswani, 2017) changed the field.";
        ReviewOutcome {
            run_id: RunId::new(),
            topic: topic.into(),
            draft: Draft::new(body),
            report: evaluate(body, None),
            items: analyses.iter().map(|a| a.item.clone()).collect(),
            analyses,
            evaluations: 3,
            exit: LoopExit::BudgetExhausted,
            degraded_discovery: false,
            elapsed: Duration::from_secs(12),
        }
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Graph Neural Networks"), "Graph_Neural_Networks");
        assert_eq!(slugify("  LLMs: safety & alignment?  "), "LLMs_safety_alignment");
        assert_eq!(slugify("???"), "untitled");
        assert!(slugify(&"long topic ".repeat(10)).chars().count() <= MAX_SLUG_CHARS);
    }

    #[test]
    fn markdown_has_references_for_successes_only() {
        let md = render_markdown(&outcome("transformers"));
        assert!(md.starts_with("# Literature Review: transformers\n"));
        assert!(md.contains("(Vaswani, 2017) changed the field."));
        assert!(md.contains("- Vaswani, A. (2017). *Attention Is All You Need*. *NeurIPS*."));
        assert!(!md.contains("A Paper That Timed Out"));
        assert!(md.contains("after 3 evaluation(s), quality gate not reached"));
        assert!(md.contains("analysis of 2 academic papers"));
    }

    #[test]
    fn bibtex_has_one_entry_per_success() {
        let bib = render_bibtex(&outcome("transformers"));
        assert_eq!(bib.matches("@article{").count(), 1);
        assert!(bib.contains("@article{vaswani2017,"));
    }

    #[test]
    fn write_review_creates_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("reviews");
        let written = write_review(&outcome("graph neural networks"), &nested).expect("write");

        assert_eq!(
            written.markdown,
            nested.join("literature_review_graph_neural_networks.md")
        );
        assert!(written.markdown.exists());
        let bib = std::fs::read_to_string(&written.bibtex).expect("read bib");
        assert!(bib.contains("vaswani2017"));
    }
}
