//! Bounded evaluate/revise loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use reviewforge_evaluator::evaluate;
use reviewforge_shared::{Draft, EvaluationReport, Phase, ReviewForgeError, RunError, RunId};

use crate::collaborators::{CallContext, Reviser, guarded_call};
use crate::pipeline::ProgressReporter;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// The last evaluation cleared the quality gate.
    Passed,
    /// The iteration budget ran out; the current draft is returned anyway.
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub draft: Draft,
    /// Evaluation of `draft`.
    pub report: EvaluationReport,
    /// Number of evaluations performed, never more than the budget.
    pub evaluations: u32,
    pub exit: LoopExit,
}

/// Evaluates a draft and asks the reviser for a new one until the draft
/// passes or `max_iterations` evaluations have been made.
pub struct RefinementLoop {
    reviser: Arc<dyn Reviser>,
    max_iterations: u32,
    timeout: Duration,
    expected_titles: Option<Vec<String>>,
}

impl RefinementLoop {
    /// A budget of zero is treated as one.
    pub fn new(reviser: Arc<dyn Reviser>, max_iterations: u32, timeout: Duration) -> Self {
        Self {
            reviser,
            max_iterations: max_iterations.max(1),
            timeout,
            expected_titles: None,
        }
    }

    /// Score coverage against these titles.
    pub fn with_expected_titles(mut self, titles: Vec<String>) -> Self {
        self.expected_titles = Some(titles);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    #[instrument(skip_all, fields(run_id = %run_id, max_iterations = self.max_iterations))]
    pub async fn refine(
        &self,
        run_id: RunId,
        initial: Draft,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<RefinementOutcome, RunError> {
        let ctx = CallContext::refinement(run_id);
        let mut draft = initial;
        let mut iteration: u32 = 0;

        loop {
            let report = evaluate(&draft.body, self.expected_titles.as_deref());
            let evaluations = iteration + 1;
            info!(
                %run_id,
                iteration,
                score = report.total,
                passed = report.passed,
                revision = draft.revision,
                "draft evaluated"
            );
            progress.iteration_scored(evaluations, &report);

            if report.passed {
                return Ok(RefinementOutcome {
                    draft,
                    report,
                    evaluations,
                    exit: LoopExit::Passed,
                });
            }
            if evaluations >= self.max_iterations {
                info!(%run_id, score = report.total, "iteration budget exhausted, keeping current draft");
                return Ok(RefinementOutcome {
                    draft,
                    report,
                    evaluations,
                    exit: LoopExit::BudgetExhausted,
                });
            }

            let revised = guarded_call(
                Phase::Refining,
                self.timeout,
                cancel,
                self.reviser.revise(&ctx, &draft.body, &report.directives),
            )
            .await?;
            if revised.trim().is_empty() {
                return Err(RunError::CollaboratorError {
                    phase: Phase::Refining,
                    source: ReviewForgeError::Collaborator("revision returned an empty draft".into()),
                });
            }

            draft = draft.revise(revised);
            iteration += 1;
        }
    }
}
