//! Role prompts for the model-backed collaborators.

use reviewforge_citation::apa_citation;
use reviewforge_shared::{AnalysisResult, DiscoveredItem};

pub const DISCOVERY_SYSTEM: &str = "\
You are a paper discovery specialist. Find relevant academic papers for a research topic.

Focus on recent papers from the last five years, high-impact venues, and seminal works.
Prefer direct PDF links from arxiv.org, aclanthology.org, or conference sites.
Avoid news articles, blog posts, and other non-academic sources.

Return a JSON array of papers:
[
  {\"title\": \"...\", \"authors\": [\"...\"], \"year\": 2023, \"venue\": \"...\", \"url\": \"https://...\"}
]";

pub const ANALYSIS_SYSTEM: &str = "\
You are a paper analysis specialist. You analyze a single academic paper in depth.

Extract the main research question, the methodology, the key findings and contributions,
the limitations stated by the authors, and suggested future work.
Be thorough but concise and focus on what is scientifically significant.";

pub const SYNTHESIS_SYSTEM: &str = "\
You are a literature synthesis specialist. You write cohesive literature reviews from
individual paper analyses.

Identify common themes, trends, contradictions, and research gaps across the papers.
Structure the review with these sections: Introduction, Major Themes, Methodological
Approaches, Key Findings, Research Gaps, Conclusion.
Cite papers in the text as (Author, Year) and write in clear academic prose.";

pub const REVISION_SYSTEM: &str = "\
You are a quality assurance specialist for literature reviews. Rewrite the draft you are
given so that it addresses every listed issue while keeping its citations and sections.

Aim for 1000 to 1500 words, clear sections with logical flow, evidence-based claims,
and explicitly identified research opportunities.
Return only the revised review text.";

/// User message for the discovery call.
pub fn discovery_request(topic: &str, limit: usize) -> String {
    format!(
        "Find {limit} highly relevant academic papers about: {topic}\n\n\
         For each paper, extract complete metadata: the full title, all authors \
         (full names), the exact publication year, the specific venue, and a direct PDF URL.\n\n\
         Return ONLY a JSON array."
    )
}

/// User message for analysing one item.
pub fn analysis_request(item: &DiscoveredItem) -> String {
    let mut out = format!("Analyze this paper:\n\nTitle: {}\n", item.title);
    if !item.authors.is_empty() {
        out.push_str(&format!("Authors: {}\n", item.authors.join(", ")));
    }
    if let Some(year) = item.year {
        out.push_str(&format!("Year: {year}\n"));
    }
    if let Some(venue) = &item.venue {
        out.push_str(&format!("Venue: {venue}\n"));
    }
    if let Some(url) = &item.source_url {
        out.push_str(&format!("URL: {url}\n"));
    }
    out
}

/// User message for synthesis: every successful analysis with its citation.
pub fn synthesis_request(topic: &str, analyses: &[AnalysisResult]) -> String {
    let mut out = format!(
        "Write a literature review on: {topic}\n\nIt covers {} papers.\n",
        analyses.len()
    );
    for (n, result) in analyses.iter().enumerate() {
        let Some(body) = result.body() else {
            continue;
        };
        out.push_str(&format!(
            "\n## Paper {}\nCitation: {}\n\n{}\n",
            n + 1,
            apa_citation(&result.citation),
            body.trim()
        ));
    }
    out
}

/// User message for a revision pass.
pub fn revision_request(draft: &str, directives: &[String]) -> String {
    let mut out = String::from("Revise the literature review below.\n\nIssues to address:\n");
    if directives.is_empty() {
        out.push_str("- Improve overall quality and flow\n");
    }
    for directive in directives {
        out.push_str(&format!("- {directive}\n"));
    }
    out.push_str("\n---\n\n");
    out.push_str(draft);
    out
}
