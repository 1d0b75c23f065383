use std::fmt;

use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::client::HttpMetricsClient;
use crate::retry::RetryPolicy;

const CANNED_SERIES: [(&str, u64); 8] = [
    ("2024-01-01", 10),
    ("2024-02-01", 14),
    ("2024-03-01", 7),
    ("2024-04-01", 18),
    ("2024-05-01", 9),
    ("2024-06-01", 22),
    ("2024-07-01", 15),
    ("2024-08-01", 11),
];

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TimeRange {
    LastMonth,
    LastSixMonths,
    #[default]
    LastYear,
    LastFiveYears,
    All,
}

/// Inclusive `last_modified` bounds sent upstream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastMonth => "1month",
            TimeRange::LastSixMonths => "6months",
            TimeRange::LastYear => "1year",
            TimeRange::LastFiveYears => "5years",
            TimeRange::All => "all",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1month" => Some(TimeRange::LastMonth),
            "6months" => Some(TimeRange::LastSixMonths),
            "1year" => Some(TimeRange::LastYear),
            "5years" => Some(TimeRange::LastFiveYears),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    pub fn window(&self, today: NaiveDate) -> Option<DateWindow> {
        let months = match self {
            TimeRange::LastMonth => 1,
            TimeRange::LastSixMonths => 6,
            TimeRange::LastYear => 12,
            TimeRange::LastFiveYears => 60,
            TimeRange::All => return None,
        };
        let start = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        Some(DateWindow { start, end: today })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChangePoint {
    pub date: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChangeHistory {
    pub slug: String,
    pub range: &'static str,
    pub points: Vec<ChangePoint>,
    pub degraded: bool,
}

/// Daily change counts for one agency, oldest first. Falls back to a canned
/// series when the upstream call fails.
pub async fn agency_history(
    client: &HttpMetricsClient,
    retry: &RetryPolicy,
    slug: &str,
    range: TimeRange,
    today: NaiveDate,
) -> ChangeHistory {
    let window = range.window(today);
    let result = retry
        .run("daily_series", || client.fetch_daily_counts(slug, window))
        .await;

    let (points, degraded) = match result {
        Ok(counts) => (
            counts
                .into_iter()
                .map(|(date, count)| ChangePoint { date, count })
                .collect(),
            false,
        ),
        Err(err) => {
            tracing::warn!(slug, range = %range, error = %err, "serving canned change history");
            (canned_series(window), true)
        }
    };

    ChangeHistory {
        slug: slug.to_string(),
        range: range.as_str(),
        points,
        degraded,
    }
}

fn canned_series(window: Option<DateWindow>) -> Vec<ChangePoint> {
    let floor = window.map(|w| w.start.to_string());
    CANNED_SERIES
        .iter()
        .filter(|(date, _)| floor.as_deref().map_or(true, |floor| *date >= floor))
        .map(|(date, count)| ChangePoint {
            date: (*date).to_string(),
            count: *count,
        })
        .collect()
}
