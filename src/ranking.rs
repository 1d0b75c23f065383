use std::fmt;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::ScoreAggregator;
use crate::client::MetricsSource;
use crate::errors::RankingError;
use crate::fallback::FallbackProvider;
use crate::metrics::Metrics;
use crate::model::RankingOutcome;
use crate::retry::RetryPolicy;
use crate::scheduler::BatchScheduler;

/// Lifecycle of a single ranking run. `Sorted`, `Fallback` and `Cancelled`
/// are terminal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    Idle,
    ListingEntities,
    Failed,
    Fallback,
    Listed,
    ProcessingChunks,
    Sorted,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::ListingEntities => "listing_entities",
            RunState::Failed => "failed",
            RunState::Fallback => "fallback",
            RunState::Listed => "listed",
            RunState::ProcessingChunks => "processing_chunks",
            RunState::Sorted => "sorted",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Sorted | RunState::Fallback | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct RunTracker {
    state: RunState,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(!self.state.is_terminal(), "run already finished");
        tracing::debug!(from = %self.state, to = %next, "run state transition");
        self.state = next;
    }
}

/// Entry point for callers: lists entities, fans out metric fetches chunk by
/// chunk, and returns either a complete ranking or the canned fallback.
pub struct RankingEngine<S> {
    source: S,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl<S: MetricsSource> RankingEngine<S> {
    pub fn new(source: S, retry: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            source,
            retry,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn compute_ranking(&self, cap: usize, concurrency: usize) -> RankingOutcome {
        self.compute_ranking_with_cancel(cap, concurrency, &CancellationToken::new())
            .await
    }

    pub async fn compute_ranking_with_cancel(
        &self,
        cap: usize,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> RankingOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, cap, concurrency);
        self.run(cap, concurrency, cancel).instrument(span).await
    }

    async fn run(
        &self,
        cap: usize,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> RankingOutcome {
        let started = Instant::now();
        let mut tracker = RunTracker::new();

        tracker.advance(RunState::ListingEntities);
        let entities = match self.source.list_entities().await {
            Ok(entities) => entities,
            Err(err) => {
                let err = RankingError::from(err);
                tracker.advance(RunState::Failed);
                tracing::error!(error = %err, "serving fallback ranking");
                tracker.advance(RunState::Fallback);
                let outcome =
                    RankingOutcome::Fallback(FallbackProvider::degraded(err.to_string()));
                self.metrics.record_run(outcome.label(), started.elapsed());
                return outcome;
            }
        };
        tracker.advance(RunState::Listed);
        tracing::info!(available = entities.len(), "listed entities");

        tracker.advance(RunState::ProcessingChunks);
        let scheduler = BatchScheduler::new(&self.source, &self.retry, &self.metrics, concurrency);
        let mut aggregator = ScoreAggregator::with_capacity(entities.len().min(cap));
        let report = scheduler.run(&entities, cap, &mut aggregator, cancel).await;

        let outcome = if report.cancelled {
            tracker.advance(RunState::Cancelled);
            RankingOutcome::Cancelled
        } else {
            let result = aggregator.finish(report.chunks_completed);
            tracker.advance(RunState::Sorted);
            tracing::info!(
                ranked = result.records.len(),
                chunks = result.chunks,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ranking complete"
            );
            RankingOutcome::Ranked(result)
        };
        self.metrics.record_run(outcome.label(), started.elapsed());
        outcome
    }
}
