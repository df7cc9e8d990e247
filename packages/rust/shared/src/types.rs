//! Core domain types for reviewforge runs.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Number of items discovered when the caller does not say otherwise.
pub const DEFAULT_MAX_ITEMS: usize = 5;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Discovering,
    Analyzing,
    Synthesizing,
    Refining,
    Completed,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Analyzing => "analyzing",
            Self::Synthesizing => "synthesizing",
            Self::Refining => "refining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `Completed` and `Failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Transitions are strictly forward, `Refining` may repeat, and `Failed`
    /// is reachable from every non-terminal phase.
    pub fn can_advance_to(&self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Self::Failed) => true,
            (Self::Idle, Self::Discovering)
            | (Self::Discovering, Self::Analyzing)
            | (Self::Analyzing, Self::Synthesizing)
            | (Self::Synthesizing, Self::Refining)
            | (Self::Refining, Self::Refining)
            | (Self::Refining, Self::Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunRequest
// ---------------------------------------------------------------------------

/// Input to a single pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Subject of the review.
    pub topic: String,
    /// Upper bound on discovered items.
    pub max_items: usize,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, max_items: usize) -> Self {
        Self {
            topic: topic.into(),
            max_items,
        }
    }

    /// Request with [`DEFAULT_MAX_ITEMS`].
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self::new(topic, DEFAULT_MAX_ITEMS)
    }
}

// ---------------------------------------------------------------------------
// DiscoveredItem
// ---------------------------------------------------------------------------

/// A source document found during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub title: String,
    /// Author names in the order the source listed them.
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Where the document can be fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<Url>,
}

// ---------------------------------------------------------------------------
// NormalizedCitation
// ---------------------------------------------------------------------------

/// Bibliographic record whose fields are guaranteed to be in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCitation {
    pub title: String,
    /// Never empty.
    pub authors: Vec<String>,
    /// Always within `[1900, 2030]`.
    pub year: i32,
    pub venue: String,
    /// One human-readable entry per repaired field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// What became of one item's analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Analyzed { body: String },
    /// Placeholder for a failed analysis; excluded from synthesis.
    Tombstone { reason: String },
}

/// Analysis of a single [`DiscoveredItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub item: DiscoveredItem,
    pub citation: NormalizedCitation,
    pub outcome: AnalysisOutcome,
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Analyzed { .. })
    }

    /// The analysis text, if the analysis succeeded.
    pub fn body(&self) -> Option<&str> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { body } => Some(body),
            AnalysisOutcome::Tombstone { .. } => None,
        }
    }

    /// The failure reason, if the result is a tombstone.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            AnalysisOutcome::Analyzed { .. } => None,
            AnalysisOutcome::Tombstone { reason } => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A synthesized document and how many times it has been revised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub body: String,
    pub revision: u32,
}

impl Draft {
    /// A fresh draft at revision 0.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            revision: 0,
        }
    }

    /// Replace the body and bump the revision counter.
    pub fn revise(self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            revision: self.revision + 1,
        }
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

// ---------------------------------------------------------------------------
// EvaluationReport
// ---------------------------------------------------------------------------

/// Per-dimension scores, each capped at 2.0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub structure: f64,
    pub length: f64,
    pub citations: f64,
    pub coverage: f64,
    pub clarity: f64,
}

impl SubScores {
    pub fn sum(&self) -> f64 {
        self.structure + self.length + self.citations + self.coverage + self.clarity
    }
}

/// One message per scored dimension.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub structure: String,
    pub length: String,
    pub citations: String,
    pub coverage: String,
    pub clarity: String,
}

/// Result of scoring a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: SubScores,
    /// Exactly `scores.sum()`.
    pub total: f64,
    pub feedback: Feedback,
    /// Ordered improvement directives for the reviser.
    pub directives: Vec<String>,
    pub passed: bool,
}
