//! Scripted collaborators for in-process pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use reviewforge_shared::{AnalysisResult, DiscoveredItem, Result, ReviewForgeError};

use crate::collaborators::{Analyzer, CallContext, Discoverer, Reviser, Synthesizer};

pub(crate) enum DiscoveryScript {
    Payload(String),
    Fail,
    Stall,
}

pub(crate) struct Scripted {
    pub discovery: DiscoveryScript,
    pub analysis_delay: Duration,
    /// Titles whose analysis returns an error.
    pub failing: Vec<String>,
    /// Titles whose analysis returns blank text.
    pub blank: Vec<String>,
    /// Titles whose analysis never finishes.
    pub stalled: Vec<String>,
    /// `None` makes synthesis fail.
    pub synthesis: Option<String>,
    pub stall_synthesis: bool,
    /// Served in order; once empty the reviser echoes its input.
    pub revisions: Mutex<VecDeque<String>>,
    pub stall_revision: bool,

    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub analyze_calls: AtomicUsize,
    pub synthesize_calls: AtomicUsize,
    pub revise_calls: AtomicUsize,
    pub sessions: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new(discovery: DiscoveryScript) -> Self {
        Self {
            discovery,
            analysis_delay: Duration::ZERO,
            failing: Vec::new(),
            blank: Vec::new(),
            stalled: Vec::new(),
            synthesis: Some(passing_draft()),
            stall_synthesis: false,
            revisions: Mutex::new(VecDeque::new()),
            stall_revision: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
            synthesize_calls: AtomicUsize::new(0),
            revise_calls: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_items(n: usize) -> Self {
        Self::new(DiscoveryScript::Payload(payload(n)))
    }

    fn record(&self, ctx: &CallContext) {
        self.sessions.lock().unwrap().push(ctx.session.clone());
    }
}

#[async_trait]
impl Discoverer for Scripted {
    async fn discover(&self, ctx: &CallContext, _topic: &str, _limit: usize) -> Result<String> {
        self.record(ctx);
        match &self.discovery {
            DiscoveryScript::Payload(raw) => Ok(raw.clone()),
            DiscoveryScript::Fail => Err(ReviewForgeError::Collaborator("search offline".into())),
            DiscoveryScript::Stall => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(String::new())
            }
        }
    }
}

#[async_trait]
impl Analyzer for Scripted {
    async fn analyze_one(&self, ctx: &CallContext, item: &DiscoveredItem) -> Result<String> {
        self.record(ctx);
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.stalled.contains(&item.title) {
            tokio::time::sleep(Duration::from_secs(600)).await;
        } else if !self.analysis_delay.is_zero() {
            tokio::time::sleep(self.analysis_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&item.title) {
            return Err(ReviewForgeError::Collaborator(format!("could not fetch {}", item.title)));
        }
        if self.blank.contains(&item.title) {
            return Ok("   ".into());
        }
        Ok(format!("Analysis of {}: the study proposes a new approach.", item.title))
    }
}

#[async_trait]
impl Synthesizer for Scripted {
    async fn synthesize(
        &self,
        ctx: &CallContext,
        _topic: &str,
        _analyses: &[AnalysisResult],
    ) -> Result<String> {
        self.record(ctx);
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_synthesis {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        self.synthesis
            .clone()
            .ok_or_else(|| ReviewForgeError::Collaborator("synthesis refused".into()))
    }
}

#[async_trait]
impl Reviser for Scripted {
    async fn revise(&self, ctx: &CallContext, draft: &str, _directives: &[String]) -> Result<String> {
        self.record(ctx);
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_revision {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        let next = self.revisions.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| draft.to_string()))
    }
}

/// Fenced JSON listing `n` items titled `Paper {i} on transformers`.
pub(crate) fn payload(n: usize) -> String {
    let entries: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#"{{"title": "Paper {i} on transformers", "authors": ["Ada Lovelace"], "year": 2021, "venue": "ACL"}}"#
            )
        })
        .collect();
    format!("```json\n[{}]\n```", entries.join(",\n"))
}

pub(crate) fn item(title: &str) -> DiscoveredItem {
    DiscoveredItem {
        title: title.to_string(),
        authors: vec!["Ada Lovelace".into()],
        year: Some(2021),
        venue: Some("ACL".into()),
        source_url: None,
    }
}

/// A draft that scores 10.0 when coverage is not checked.
pub(crate) fn passing_draft() -> String {
    let markers = ["Introduction", "Theme", "Finding", "Gap", "Conclusion"];
    let register = ["however", "moreover", "furthermore", "therefore", "consequently", "research"];
    let mut sentences = Vec::new();
    for i in 0..60 {
        let mut words: Vec<&str> = Vec::new();
        if let Some(&marker) = markers.get(i) {
            words.push(marker);
        }
        if i == 0 {
            words.extend(register);
        }
        if i < 12 {
            words.extend(["(Smith,", "2020)"]);
        }
        while words.len() < 20 {
            words.push("text");
        }
        sentences.push(format!("{}.", words.join(" ")));
    }
    sentences.join(" ")
}

/// A draft that fails the quality gate.
pub(crate) fn failing_draft() -> String {
    "A short note without structure.".to_string()
}
