//! Collaborator capabilities consumed by the orchestrator.
//!
//! Each role is a single-method async trait. Implementations may be backed by
//! a remote model ([`crate::llm::LlmCollaborators`]) or scripted in tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use reviewforge_shared::{AnalysisResult, DiscoveredItem, Phase, Result, RunError, RunId};

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Identifies the run and external session a collaborator call belongs to.
///
/// Session names are unique per run and per analysed item, so concurrent
/// runs never share remote conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub run_id: RunId,
    pub session: String,
}

impl CallContext {
    pub fn new(run_id: RunId, session: impl Into<String>) -> Self {
        Self {
            run_id,
            session: session.into(),
        }
    }

    pub fn discovery(run_id: RunId) -> Self {
        Self::new(run_id, format!("{run_id}/discovery"))
    }

    /// Session for the item at `index` in discovery order.
    pub fn analysis(run_id: RunId, index: usize) -> Self {
        Self::new(run_id, format!("{run_id}/analysis/{index}"))
    }

    pub fn synthesis(run_id: RunId) -> Self {
        Self::new(run_id, format!("{run_id}/synthesis"))
    }

    pub fn refinement(run_id: RunId) -> Self {
        Self::new(run_id, format!("{run_id}/refinement"))
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Finds candidate documents for a topic.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Return the raw structured payload; parsing happens in the orchestrator.
    async fn discover(&self, ctx: &CallContext, topic: &str, limit: usize) -> Result<String>;
}

/// Produces a free-text analysis of one item.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze_one(&self, ctx: &CallContext, item: &DiscoveredItem) -> Result<String>;
}

/// Combines successful analyses into a first draft.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        ctx: &CallContext,
        topic: &str,
        analyses: &[AnalysisResult],
    ) -> Result<String>;
}

/// Rewrites a draft according to evaluator directives.
#[async_trait]
pub trait Reviser: Send + Sync {
    async fn revise(&self, ctx: &CallContext, draft: &str, directives: &[String]) -> Result<String>;
}

/// The full set of capabilities a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub discoverer: Arc<dyn Discoverer>,
    pub analyzer: Arc<dyn Analyzer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub reviser: Arc<dyn Reviser>,
}

impl Collaborators {
    /// Use one value for every role.
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: Discoverer + Analyzer + Synthesizer + Reviser + 'static,
    {
        Self {
            discoverer: shared.clone(),
            analyzer: shared.clone(),
            synthesizer: shared.clone(),
            reviser: shared,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Guarded calls
// ---------------------------------------------------------------------------

/// Await a collaborator call under a deadline and the run's cancellation
/// token, mapping every failure onto a [`RunError`] for `phase`.
pub(crate) async fn guarded_call<T, F>(
    phase: Phase,
    timeout: Duration,
    cancel: &CancellationToken,
    call: F,
) -> std::result::Result<T, RunError>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RunError::Cancelled { phase }),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(RunError::CollaboratorError { phase, source }),
            Err(_) => Err(RunError::CollaboratorTimeout { phase, timeout }),
        },
    }
}
