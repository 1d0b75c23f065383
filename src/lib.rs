//! Ranks eCFR agencies by a composite of their search-result count and the
//! sum of their daily change counts, under the upstream's rate limits.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod history;
pub mod lookup;
pub mod metrics;
pub mod model;
pub mod ranking;
pub mod retry;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{build_http_client, HttpMetricsClient, MetricsSource};
pub use errors::{FetchError, RankingError};
pub use model::{DegradedFallback, Entity, RankedResult, RankingOutcome, ScoreRecord};
pub use ranking::RankingEngine;
pub use retry::RetryPolicy;
