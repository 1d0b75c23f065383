use crate::model::{DegradedFallback, ScoreRecord};

// Illustrative figures only; never derived from upstream data.
const CANNED_SCORES: [(&str, &str, u64, u64); 3] = [
    ("epa", "Environmental Protection Agency", 500_000, 120_000),
    ("usda", "Department of Agriculture", 420_000, 95_000),
    ("doc", "Department of Commerce", 380_000, 110_000),
];

pub struct FallbackProvider;

impl FallbackProvider {
    pub const LEN: usize = CANNED_SCORES.len();

    pub fn degraded(reason: impl Into<String>) -> DegradedFallback {
        let records = CANNED_SCORES
            .iter()
            .map(|(slug, name, scalar, series)| {
                ScoreRecord::with_counts(slug.to_string(), name.to_string(), *scalar, *series)
            })
            .collect();
        DegradedFallback {
            records,
            degraded: true,
            reason: reason.into(),
        }
    }
}
