use std::cmp::Reverse;

use crate::model::{Entity, MetricSample, RankedResult, ScoreRecord};

/// Collects one record per entity in listing order, then sorts once.
#[derive(Debug, Default)]
pub struct ScoreAggregator {
    records: Vec<ScoreRecord>,
}

impl ScoreAggregator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, entity: &Entity, sample: MetricSample) {
        self.records.push(ScoreRecord::new(entity, sample));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `sort_by_key` is stable, so equal scores keep their listing order.
    pub fn finish(mut self, chunks: usize) -> RankedResult {
        self.records.sort_by_key(|record| Reverse(record.score));
        RankedResult {
            records: self.records,
            chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(scalar: u64, series: u64) -> MetricSample {
        MetricSample {
            scalar_count: scalar,
            series_total: series,
            ..MetricSample::default()
        }
    }

    #[test]
    fn sorts_descending_and_keeps_ties_in_listing_order() {
        let mut aggregator = ScoreAggregator::default();
        aggregator.record(&Entity::new("a", "A"), sample(5, 5));
        aggregator.record(&Entity::new("b", "B"), sample(20, 0));
        aggregator.record(&Entity::new("c", "C"), sample(0, 10));
        aggregator.record(&Entity::new("d", "D"), sample(7, 3));
        assert_eq!(aggregator.len(), 4);

        let result = aggregator.finish(1);
        let order: Vec<_> = result.records.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
        for record in &result.records {
            assert_eq!(record.score, record.scalar_count + record.series_total);
        }
    }

    #[test]
    fn empty_aggregator_finishes_empty() {
        let aggregator = ScoreAggregator::with_capacity(8);
        assert!(aggregator.is_empty());
        let result = aggregator.finish(0);
        assert!(result.records.is_empty());
        assert_eq!(result.chunks, 0);
    }
}
