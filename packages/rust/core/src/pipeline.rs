//! End-to-end review pipeline: topic → discovery → analysis → synthesis → refinement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use reviewforge_discovery::{DiscoveredSet, resolve_items};
use reviewforge_shared::{
    AnalysisResult, DiscoveredItem, Draft, EvaluationReport, NormalizedCitation, Phase,
    PipelineConfig, ReviewForgeError, RunError, RunId, RunRequest,
};

use crate::collaborators::{CallContext, Collaborators, guarded_call};
use crate::fanout::AnalysisFanOut;
use crate::refinement::{LoopExit, RefinementLoop, RefinementOutcome};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when the run enters a new phase.
    fn phase(&self, phase: Phase);
    /// Called once per item as analysis results are collected.
    fn item_analyzed(&self, title: &str, succeeded: bool, current: usize, total: usize);
    /// Called after each refinement evaluation.
    fn iteration_scored(&self, iteration: u32, report: &EvaluationReport);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &ReviewOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: Phase) {}
    fn item_analyzed(&self, _title: &str, _succeeded: bool, _current: usize, _total: usize) {}
    fn iteration_scored(&self, _iteration: u32, _report: &EvaluationReport) {}
    fn done(&self, _outcome: &ReviewOutcome) {}
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub run_id: RunId,
    pub topic: String,
    /// The refinement loop's final draft, returned whether or not it passed.
    pub draft: Draft,
    /// Evaluation of `draft`.
    pub report: EvaluationReport,
    pub items: Vec<DiscoveredItem>,
    /// One per item, tombstones included.
    pub analyses: Vec<AnalysisResult>,
    pub evaluations: u32,
    pub exit: LoopExit,
    /// Discovery output was malformed and the built-in list was used.
    pub degraded_discovery: bool,
    pub elapsed: Duration,
}

impl ReviewOutcome {
    /// Whether the final draft cleared the quality gate.
    pub fn passed(&self) -> bool {
        self.report.passed
    }

    /// Citations of the successfully analysed items, in discovery order.
    pub fn citations(&self) -> Vec<&NormalizedCitation> {
        self.analyses
            .iter()
            .filter(|r| r.is_success())
            .map(|r| &r.citation)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Working memory of one run. Never shared between runs.
struct RunState {
    run_id: RunId,
    phase: Phase,
    items: Vec<DiscoveredItem>,
    analyses: Vec<AnalysisResult>,
    degraded: bool,
}

impl RunState {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            phase: Phase::Idle,
            items: Vec::new(),
            analyses: Vec::new(),
            degraded: false,
        }
    }

    fn advance(&mut self, next: Phase, progress: &dyn ProgressReporter) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {} -> {next}",
            self.phase
        );
        info!(run_id = %self.run_id, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        progress.phase(next);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Sequences the phases of a review run and owns its error policy.
pub struct Orchestrator {
    config: PipelineConfig,
    collaborators: Collaborators,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for `request`.
    ///
    /// 1. Discovery (falls back to a built-in list on malformed output)
    /// 2. Bounded concurrent analysis
    /// 3. Synthesis of the successful analyses
    /// 4. Refinement until the draft passes or the budget runs out
    ///
    /// Any error discards the run's partial state.
    #[instrument(skip_all, fields(topic = %request.topic, max_items = request.max_items))]
    pub async fn run(
        &self,
        request: &RunRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ReviewOutcome, RunError> {
        let start = Instant::now();
        self.validate(request)?;

        let mut state = RunState::new(RunId::new());
        info!(run_id = %state.run_id, "starting review run");

        match self.drive(request, &mut state, progress, cancel).await {
            Ok(refined) => {
                state.advance(Phase::Completed, progress);
                let outcome = ReviewOutcome {
                    run_id: state.run_id,
                    topic: request.topic.clone(),
                    draft: refined.draft,
                    report: refined.report,
                    items: state.items,
                    analyses: state.analyses,
                    evaluations: refined.evaluations,
                    exit: refined.exit,
                    degraded_discovery: state.degraded,
                    elapsed: start.elapsed(),
                };
                info!(
                    run_id = %outcome.run_id,
                    score = outcome.report.total,
                    passed = outcome.passed(),
                    evaluations = outcome.evaluations,
                    elapsed_ms = outcome.elapsed.as_millis(),
                    "review run completed"
                );
                progress.done(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                let failed_in = err.phase();
                state.advance(Phase::Failed, progress);
                warn!(run_id = %state.run_id, phase = %failed_in, error = %err, "review run failed");
                Err(err)
            }
        }
    }

    fn validate(&self, request: &RunRequest) -> Result<(), RunError> {
        if request.topic.trim().is_empty() {
            return Err(RunError::invalid_request("topic must not be empty"));
        }
        if request.max_items == 0 {
            return Err(RunError::invalid_request("max_items must be at least 1"));
        }
        self.config
            .validate()
            .map_err(|e| RunError::invalid_request(e.to_string()))
    }

    async fn drive(
        &self,
        request: &RunRequest,
        state: &mut RunState,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<RefinementOutcome, RunError> {
        let run_id = state.run_id;
        let topic = request.topic.trim();

        // --- Discovering ---
        state.advance(Phase::Discovering, progress);
        let raw = guarded_call(
            Phase::Discovering,
            self.config.collaborator_timeout,
            cancel,
            self.collaborators.discoverer.discover(
                &CallContext::discovery(run_id),
                topic,
                request.max_items,
            ),
        )
        .await?;

        let DiscoveredSet { items, degraded } = resolve_items(&raw, request.max_items);
        if degraded {
            warn!(%run_id, fallback_items = items.len(), "discovery degraded");
        }
        if items.is_empty() {
            return Err(RunError::NoContentFound);
        }
        info!(%run_id, items = items.len(), degraded, "discovery complete");
        state.items = items;
        state.degraded = degraded;

        // --- Analyzing ---
        state.advance(Phase::Analyzing, progress);
        let fanout = AnalysisFanOut::new(
            Arc::clone(&self.collaborators.analyzer),
            self.config.analysis_workers,
            self.config.analysis_timeout,
        );
        state.analyses = fanout.analyze(run_id, &state.items, progress, cancel).await?;

        // --- Synthesizing ---
        state.advance(Phase::Synthesizing, progress);
        let successes: Vec<AnalysisResult> = state
            .analyses
            .iter()
            .filter(|r| r.is_success())
            .cloned()
            .collect();
        if successes.is_empty() {
            return Err(RunError::SynthesisInputEmpty);
        }

        let body = guarded_call(
            Phase::Synthesizing,
            self.config.collaborator_timeout,
            cancel,
            self.collaborators.synthesizer.synthesize(
                &CallContext::synthesis(run_id),
                topic,
                &successes,
            ),
        )
        .await?;
        if body.trim().is_empty() {
            return Err(RunError::CollaboratorError {
                phase: Phase::Synthesizing,
                source: ReviewForgeError::Collaborator("synthesis returned an empty draft".into()),
            });
        }

        // --- Refining ---
        state.advance(Phase::Refining, progress);
        let mut refinement = RefinementLoop::new(
            Arc::clone(&self.collaborators.reviser),
            self.config.max_iterations,
            self.config.collaborator_timeout,
        );
        if self.config.check_coverage {
            refinement = refinement
                .with_expected_titles(successes.iter().map(|r| r.item.title.clone()).collect());
        }

        refinement
            .refine(run_id, Draft::new(body), progress, cancel)
            .await
    }
}

/// Run one review with no progress reporting and no external cancellation.
pub async fn run_pipeline(
    config: PipelineConfig,
    collaborators: Collaborators,
    topic: &str,
    max_items: usize,
) -> Result<ReviewOutcome, RunError> {
    Orchestrator::new(config, collaborators)
        .run(
            &RunRequest::new(topic, max_items),
            &SilentProgress,
            &CancellationToken::new(),
        )
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{DiscoveryScript, Scripted, failing_draft, payload};

    fn config() -> PipelineConfig {
        PipelineConfig {
            analysis_workers: 2,
            analysis_timeout: Duration::from_millis(200),
            collaborator_timeout: Duration::from_millis(200),
            max_iterations: 3,
            check_coverage: false,
        }
    }

    async fn run_with(
        scripted: Arc<Scripted>,
        config: PipelineConfig,
        max_items: usize,
    ) -> Result<ReviewOutcome, RunError> {
        run_pipeline(config, Collaborators::from_shared(scripted), "transformers", max_items).await
    }

    /// Records every phase change.
    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<Phase>>,
        scored: Mutex<Vec<u32>>,
    }

    impl ProgressReporter for Recorder {
        fn phase(&self, phase: Phase) {
            self.phases.lock().unwrap().push(phase);
        }
        fn item_analyzed(&self, _title: &str, _succeeded: bool, _current: usize, _total: usize) {}
        fn iteration_scored(&self, iteration: u32, _report: &EvaluationReport) {
            self.scored.lock().unwrap().push(iteration);
        }
        fn done(&self, _outcome: &ReviewOutcome) {}
    }

    #[tokio::test]
    async fn happy_path_completes() {
        let scripted = Arc::new(Scripted::with_items(3));
        let outcome = run_with(scripted.clone(), config(), 5).await.unwrap();

        assert!(outcome.passed());
        assert_eq!(outcome.exit, LoopExit::Passed);
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(outcome.analyses.len(), 3);
        assert_eq!(outcome.citations().len(), 3);
        assert!(!outcome.degraded_discovery);
        assert_eq!(scripted.synthesize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn phases_advance_in_order() {
        let scripted = Arc::new(Scripted::with_items(2));
        let recorder = Recorder::default();
        Orchestrator::new(config(), Collaborators::from_shared(scripted))
            .run(
                &RunRequest::new("transformers", 2),
                &recorder,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            *recorder.phases.lock().unwrap(),
            vec![
                Phase::Discovering,
                Phase::Analyzing,
                Phase::Synthesizing,
                Phase::Refining,
                Phase::Completed
            ]
        );
        assert_eq!(*recorder.scored.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn oversupply_is_truncated_in_rank_order() {
        let scripted = Arc::new(Scripted::with_items(8));
        let outcome = run_with(scripted.clone(), config(), 3).await.unwrap();

        let titles: Vec<&str> = outcome.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Paper 0 on transformers", "Paper 1 on transformers", "Paper 2 on transformers"]
        );
        assert_eq!(scripted.analyze_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_discovery_uses_fallback() {
        let scripted = Arc::new(Scripted::new(DiscoveryScript::Payload(
            "I'm sorry, I couldn't find any papers.".into(),
        )));
        let outcome = run_with(scripted, config(), 5).await.unwrap();

        assert!(outcome.degraded_discovery);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items[0].title, "Attention Is All You Need");
        assert!(outcome.passed());
    }

    #[tokio::test]
    async fn empty_discovery_is_no_content() {
        let scripted = Arc::new(Scripted::new(DiscoveryScript::Payload("[]".into())));
        let err = run_with(scripted.clone(), config(), 5).await.unwrap_err();

        assert!(matches!(err, RunError::NoContentFound));
        assert_eq!(err.phase(), Phase::Discovering);
        assert_eq!(scripted.analyze_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn discovery_error_and_timeout_fail_the_run() {
        let err = run_with(Arc::new(Scripted::new(DiscoveryScript::Fail)), config(), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::CollaboratorError {
                phase: Phase::Discovering,
                ..
            }
        ));

        let err = run_with(Arc::new(Scripted::new(DiscoveryScript::Stall)), config(), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::CollaboratorTimeout {
                phase: Phase::Discovering,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn all_tombstones_skip_synthesis() {
        let mut scripted = Scripted::with_items(3);
        scripted.failing = (0..3).map(|i| format!("Paper {i} on transformers")).collect();
        let scripted = Arc::new(scripted);

        let err = run_with(scripted.clone(), config(), 3).await.unwrap_err();
        assert!(matches!(err, RunError::SynthesisInputEmpty));
        assert_eq!(err.phase(), Phase::Synthesizing);
        assert_eq!(scripted.synthesize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_failures_still_synthesize() {
        let mut scripted = Scripted::with_items(3);
        scripted.failing = vec!["Paper 1 on transformers".into()];
        let outcome = run_with(Arc::new(scripted), config(), 3).await.unwrap();

        assert_eq!(outcome.analyses.len(), 3);
        assert!(!outcome.analyses[1].is_success());
        assert_eq!(outcome.citations().len(), 2);
    }

    #[tokio::test]
    async fn synthesis_failure_is_surfaced() {
        let mut scripted = Scripted::with_items(2);
        scripted.synthesis = None;
        let err = run_with(Arc::new(scripted), config(), 2).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::CollaboratorError {
                phase: Phase::Synthesizing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn synthesis_timeout_is_surfaced() {
        let mut scripted = Scripted::with_items(2);
        scripted.stall_synthesis = true;
        let scripted = Arc::new(scripted);

        let err = run_with(scripted.clone(), config(), 2).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::CollaboratorTimeout {
                phase: Phase::Synthesizing,
                ..
            }
        ));
        assert_eq!(scripted.revise_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn revision_timeout_is_surfaced() {
        let mut scripted = Scripted::with_items(2);
        scripted.synthesis = Some(failing_draft());
        scripted.stall_revision = true;
        let scripted = Arc::new(scripted);

        let err = run_with(scripted.clone(), config(), 2).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::CollaboratorTimeout {
                phase: Phase::Refining,
                ..
            }
        ));
        assert_eq!(scripted.revise_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn low_quality_draft_is_still_returned() {
        let mut scripted = Scripted::with_items(2);
        scripted.synthesis = Some(failing_draft());
        let scripted = Arc::new(scripted);

        let outcome = run_with(scripted.clone(), config(), 2).await.unwrap();
        assert!(!outcome.passed());
        assert_eq!(outcome.exit, LoopExit::BudgetExhausted);
        assert_eq!(outcome.evaluations, 3);
        assert_eq!(scripted.revise_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_requests_fail_fast() {
        let scripted = Arc::new(Scripted::with_items(2));
        let err = run_pipeline(config(), Collaborators::from_shared(scripted.clone()), "  ", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidRequest { .. }));

        let err = run_pipeline(config(), Collaborators::from_shared(scripted.clone()), "topic", 0)
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Phase::Idle);
        assert!(scripted.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_run() {
        let a = Arc::new(Scripted::with_items(2));
        let b = Arc::new(Scripted::with_items(2));
        let (ra, rb) = tokio::join!(run_with(a.clone(), config(), 2), run_with(b.clone(), config(), 2));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_ne!(ra.run_id, rb.run_id);
        let prefix = ra.run_id.to_string();
        assert!(a.sessions.lock().unwrap().iter().all(|s| s.starts_with(&prefix)));
        assert!(!b.sessions.lock().unwrap().iter().any(|s| s.starts_with(&prefix)));
    }

    #[tokio::test]
    async fn cancellation_during_analysis() {
        let mut scripted = Scripted::new(DiscoveryScript::Payload(payload(6)));
        scripted.analysis_delay = Duration::from_millis(100);
        let scripted = Arc::new(scripted);
        let mut cfg = config();
        cfg.analysis_workers = 1;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            canceller.cancel();
        });

        let err = Orchestrator::new(cfg, Collaborators::from_shared(scripted.clone()))
            .run(&RunRequest::new("transformers", 6), &SilentProgress, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled { phase: Phase::Analyzing }));
        assert!(scripted.analyze_calls.load(Ordering::SeqCst) < 6);
        assert_eq!(scripted.synthesize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_during_refinement() {
        let mut scripted = Scripted::with_items(2);
        scripted.synthesis = Some(failing_draft());
        scripted.stall_revision = true;
        let scripted = Arc::new(scripted);
        let mut cfg = config();
        cfg.collaborator_timeout = Duration::from_secs(30);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let recorder = Recorder::default();
        let err = Orchestrator::new(cfg, Collaborators::from_shared(scripted.clone()))
            .run(&RunRequest::new("transformers", 2), &recorder, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled { phase: Phase::Refining }));
        assert_eq!(scripted.revise_calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.phases.lock().unwrap().last(), Some(&Phase::Failed));
    }
}
