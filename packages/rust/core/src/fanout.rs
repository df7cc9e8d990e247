//! Bounded concurrent analysis of discovered items.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use reviewforge_citation::normalize_item;
use reviewforge_shared::{AnalysisOutcome, AnalysisResult, DiscoveredItem, Phase, RunError, RunId};

use crate::collaborators::{Analyzer, CallContext};
use crate::pipeline::ProgressReporter;

/// Runs one analysis per item with at most `workers` in flight.
///
/// A failed, empty, timed-out, or panicked analysis becomes a tombstone for
/// that item; it never aborts the batch.
pub struct AnalysisFanOut {
    analyzer: Arc<dyn Analyzer>,
    workers: usize,
    timeout: Duration,
}

impl AnalysisFanOut {
    pub fn new(analyzer: Arc<dyn Analyzer>, workers: usize, timeout: Duration) -> Self {
        Self {
            analyzer,
            workers: workers.max(1),
            timeout,
        }
    }

    /// Analyze `items`, returning one result per item in input order.
    ///
    /// Cancellation stops new launches immediately; analyses already running
    /// are allowed to finish or time out before [`RunError::Cancelled`] is
    /// returned.
    #[instrument(skip_all, fields(run_id = %run_id, items = items.len(), workers = self.workers))]
    pub async fn analyze(
        &self,
        run_id: RunId,
        items: &[DiscoveredItem],
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalysisResult>, RunError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(items.len());
        let mut cancelled = false;

        for (index, item) in items.iter().enumerate() {
            let acquired = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = acquired else {
                cancelled = true;
                break;
            };

            let analyzer = Arc::clone(&self.analyzer);
            let ctx = CallContext::analysis(run_id, index);
            let item = item.clone();
            let timeout = self.timeout;

            debug!(index, title = %item.title, "launching analysis");
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                analyze_item(analyzer.as_ref(), &ctx, &item, timeout).await
            }));
        }

        let total = items.len();
        let mut results = Vec::with_capacity(handles.len());

        for (index, (item, handle)) in items.iter().zip(handles).enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => AnalysisOutcome::Tombstone {
                    reason: format!("analysis task aborted: {e}"),
                },
            };

            let succeeded = matches!(outcome, AnalysisOutcome::Analyzed { .. });
            if let AnalysisOutcome::Tombstone { reason } = &outcome {
                warn!(index, title = %item.title, %reason, "analysis tombstoned");
            }
            progress.item_analyzed(&item.title, succeeded, index + 1, total);

            results.push(AnalysisResult {
                item: item.clone(),
                citation: normalize_item(item),
                outcome,
            });
        }

        if cancelled {
            info!(launched = results.len(), total, "analysis cancelled");
            return Err(RunError::Cancelled {
                phase: Phase::Analyzing,
            });
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(succeeded, tombstoned = total - succeeded, "analysis complete");
        Ok(results)
    }
}

async fn analyze_item(
    analyzer: &dyn Analyzer,
    ctx: &CallContext,
    item: &DiscoveredItem,
    timeout: Duration,
) -> AnalysisOutcome {
    match tokio::time::timeout(timeout, analyzer.analyze_one(ctx, item)).await {
        Ok(Ok(body)) if !body.trim().is_empty() => AnalysisOutcome::Analyzed { body },
        Ok(Ok(_)) => AnalysisOutcome::Tombstone {
            reason: "analysis returned no content".into(),
        },
        Ok(Err(e)) => AnalysisOutcome::Tombstone {
            reason: e.to_string(),
        },
        Err(_) => AnalysisOutcome::Tombstone {
            reason: format!("analysis timed out after {timeout:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::pipeline::SilentProgress;
    use crate::testing::{DiscoveryScript, Scripted, item};

    fn items(n: usize) -> Vec<DiscoveredItem> {
        (0..n).map(|i| item(&format!("Paper {i} on transformers"))).collect()
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let scripted = Arc::new(Scripted::new(DiscoveryScript::Fail));
        let fanout = AnalysisFanOut::new(scripted, 3, Duration::from_secs(5));
        let input = items(7);

        let results = fanout
            .analyze(RunId::new(), &input, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 7);
        for (result, item) in results.iter().zip(&input) {
            assert_eq!(&result.item, item);
            assert!(result.body().unwrap().contains(&item.title));
            assert_eq!(result.citation.title, item.title);
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_workers() {
        let mut scripted = Scripted::new(DiscoveryScript::Fail);
        scripted.analysis_delay = Duration::from_millis(30);
        let scripted = Arc::new(scripted);
        let fanout = AnalysisFanOut::new(scripted.clone(), 2, Duration::from_secs(5));

        let results = fanout
            .analyze(RunId::new(), &items(9), &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 9);
        assert_eq!(scripted.analyze_calls.load(Ordering::SeqCst), 9);
        let peak = scripted.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency {peak} exceeded worker bound");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn every_failure_is_tombstoned() {
        let input = items(4);
        let mut scripted = Scripted::new(DiscoveryScript::Fail);
        scripted.failing = input.iter().map(|i| i.title.clone()).collect();
        let fanout = AnalysisFanOut::new(Arc::new(scripted), 4, Duration::from_secs(5));

        let results = fanout
            .analyze(RunId::new(), &input, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !r.is_success()));
        assert!(results[0].failure_reason().unwrap().contains("could not fetch"));
    }

    #[tokio::test]
    async fn blank_and_stalled_items_are_tombstoned() {
        let input = items(3);
        let mut scripted = Scripted::new(DiscoveryScript::Fail);
        scripted.blank = vec![input[0].title.clone()];
        scripted.stalled = vec![input[2].title.clone()];
        let fanout = AnalysisFanOut::new(Arc::new(scripted), 3, Duration::from_millis(50));

        let results = fanout
            .analyze(RunId::new(), &input, &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results[0].failure_reason(), Some("analysis returned no content"));
        assert!(results[1].is_success());
        assert!(results[2].failure_reason().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn sessions_are_per_item() {
        let scripted = Arc::new(Scripted::new(DiscoveryScript::Fail));
        let fanout = AnalysisFanOut::new(scripted.clone(), 2, Duration::from_secs(5));
        let run_id = RunId::new();

        fanout
            .analyze(run_id, &items(3), &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();

        let mut sessions = scripted.sessions.lock().unwrap().clone();
        sessions.sort();
        assert_eq!(
            sessions,
            (0..3).map(|i| format!("{run_id}/analysis/{i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn cancellation_stops_new_launches() {
        let mut scripted = Scripted::new(DiscoveryScript::Fail);
        scripted.analysis_delay = Duration::from_millis(100);
        let scripted = Arc::new(scripted);
        let fanout = AnalysisFanOut::new(scripted.clone(), 1, Duration::from_secs(5));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let err = fanout
            .analyze(RunId::new(), &items(10), &SilentProgress, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled { phase: Phase::Analyzing }));
        // the in-flight analysis finished; nothing else was started
        assert_eq!(scripted.analyze_calls.load(Ordering::SeqCst), 1);
        assert_eq!(scripted.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_workers_still_makes_progress() {
        let fanout = AnalysisFanOut::new(
            Arc::new(Scripted::new(DiscoveryScript::Fail)),
            0,
            Duration::from_secs(5),
        );
        let results = fanout
            .analyze(RunId::new(), &items(2), &SilentProgress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }
}
