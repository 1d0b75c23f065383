use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// An agency as returned by the upstream listing.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Entity {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
}

impl Entity {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            display_name: None,
            short_name: None,
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Both metrics for one entity, with failed fetches zero-filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricSample {
    pub scalar_count: u64,
    pub series_total: u64,
    pub scalar_degraded: bool,
    pub series_degraded: bool,
}

impl MetricSample {
    pub fn from_results(
        scalar: &Result<u64, FetchError>,
        series: &Result<u64, FetchError>,
    ) -> Self {
        Self {
            scalar_count: *scalar.as_ref().unwrap_or(&0),
            series_total: *series.as_ref().unwrap_or(&0),
            scalar_degraded: scalar.is_err(),
            series_degraded: series.is_err(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ScoreRecord {
    pub slug: String,
    pub display_name: String,
    pub scalar_count: u64,
    pub series_total: u64,
    pub score: u64,
    pub scalar_degraded: bool,
    pub series_degraded: bool,
}

impl ScoreRecord {
    pub fn new(entity: &Entity, sample: MetricSample) -> Self {
        Self::with_counts(
            entity.slug.clone(),
            entity.label().to_string(),
            sample.scalar_count,
            sample.series_total,
        )
        .degraded(sample.scalar_degraded, sample.series_degraded)
    }

    pub(crate) fn with_counts(
        slug: String,
        display_name: String,
        scalar_count: u64,
        series_total: u64,
    ) -> Self {
        Self {
            slug,
            display_name,
            scalar_count,
            series_total,
            score: scalar_count.saturating_add(series_total),
            scalar_degraded: false,
            series_degraded: false,
        }
    }

    fn degraded(mut self, scalar: bool, series: bool) -> Self {
        self.scalar_degraded = scalar;
        self.series_degraded = series;
        self
    }
}

/// A complete ranking, sorted by score descending with ties in listing order.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RankedResult {
    pub records: Vec<ScoreRecord>,
    pub chunks: usize,
}

/// The canned ranking returned when the entity listing cannot be obtained.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DegradedFallback {
    pub records: Vec<ScoreRecord>,
    pub degraded: bool,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankingOutcome {
    Ranked(RankedResult),
    Fallback(DegradedFallback),
    Cancelled,
}

impl RankingOutcome {
    pub fn records(&self) -> &[ScoreRecord] {
        match self {
            RankingOutcome::Ranked(result) => &result.records,
            RankingOutcome::Fallback(fallback) => &fallback.records,
            RankingOutcome::Cancelled => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RankingOutcome::Fallback(fallback) if fallback.degraded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RankingOutcome::Ranked(_) => "ranked",
            RankingOutcome::Fallback(_) => "fallback",
            RankingOutcome::Cancelled => "cancelled",
        }
    }
}
