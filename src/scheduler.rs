use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::aggregate::ScoreAggregator;
use crate::client::MetricsSource;
use crate::errors::FetchError;
use crate::metrics::Metrics;
use crate::model::{Entity, MetricSample};
use crate::retry::RetryPolicy;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_ENTITY_CAP: usize = 50;

/// Keeps the first `cap` entities in listing order and splits them into
/// consecutive chunks of at most `width` (a zero width is treated as one).
pub fn plan_chunks(entities: &[Entity], cap: usize, width: usize) -> Vec<&[Entity]> {
    let capped = &entities[..entities.len().min(cap)];
    capped.chunks(width.max(1)).collect()
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScheduleReport {
    pub chunks_completed: usize,
    pub cancelled: bool,
}

/// Drives chunks strictly one after another; inside a chunk every entity's
/// two fetches run concurrently, so at most `2 * width` calls are in flight.
pub struct BatchScheduler<'a, S> {
    source: &'a S,
    retry: &'a RetryPolicy,
    metrics: &'a Metrics,
    width: usize,
}

impl<'a, S: MetricsSource> BatchScheduler<'a, S> {
    pub fn new(source: &'a S, retry: &'a RetryPolicy, metrics: &'a Metrics, width: usize) -> Self {
        Self {
            source,
            retry,
            metrics,
            width: width.max(1),
        }
    }

    pub async fn run(
        &self,
        entities: &[Entity],
        cap: usize,
        aggregator: &mut ScoreAggregator,
        cancel: &CancellationToken,
    ) -> ScheduleReport {
        let chunks = plan_chunks(entities, cap, self.width);
        let total = chunks.len();
        let mut report = ScheduleReport::default();

        for (index, chunk) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    completed = report.chunks_completed,
                    remaining = total - index,
                    "cancellation requested, not starting further chunks"
                );
                report.cancelled = true;
                return report;
            }

            tracing::debug!(chunk = index, of = total, size = chunk.len(), "processing chunk");
            let samples = join_all(chunk.iter().map(|entity| self.fetch_entity(entity))).await;
            for (entity, sample) in chunk.iter().zip(samples) {
                aggregator.record(entity, sample);
            }
            report.chunks_completed += 1;
        }

        report
    }

    async fn fetch_entity(&self, entity: &Entity) -> MetricSample {
        let slug = entity.slug.as_str();
        let (scalar, series) = tokio::join!(
            self.retry
                .run("scalar_count", || self.source.fetch_scalar_count(slug)),
            self.retry
                .run("series_total", || self.source.fetch_series_total(slug)),
        );
        self.note_degraded(slug, "scalar_count", &scalar);
        self.note_degraded(slug, "series_total", &series);
        MetricSample::from_results(&scalar, &series)
    }

    fn note_degraded(&self, slug: &str, metric: &str, result: &Result<u64, FetchError>) {
        if let Err(err) = result {
            self.metrics.record_degraded(metric, err.reason());
            tracing::warn!(slug, metric, error = %err, "metric degraded to zero");
        }
    }
}
