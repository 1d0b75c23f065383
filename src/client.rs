use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::errors::FetchError;
use crate::history::DateWindow;
use crate::metrics::Metrics;
use crate::model::Entity;

pub const USER_AGENT_VALUE: &str = "agency-ranker/0.1";

const AGENCIES_PATH: &str = "/api/admin/v1/agencies.json";
const COUNT_PATH: &str = "/api/search/v1/count";
const DAILY_COUNTS_PATH: &str = "/api/search/v1/counts/daily";
const MATCH_ALL_QUERY: &str = "*";
const AGENCY_SLUG_PARAM: &str = "agency_slugs[]";

/// The three upstream calls a ranking run depends on.
pub trait MetricsSource: Sync {
    fn list_entities(&self) -> impl Future<Output = Result<Vec<Entity>, FetchError>> + Send;

    fn fetch_scalar_count(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;

    fn fetch_series_total(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .pool_max_idle_per_host(10)
        .default_headers(headers)
        .use_rustls_tls()
        .build()
        .context("building HTTP client")?;
    Ok(client)
}

/// eCFR-backed metrics source.
#[derive(Clone)]
pub struct HttpMetricsClient {
    client: Client,
    base_url: String,
    metrics: Metrics,
}

impl HttpMetricsClient {
    pub fn new(client: Client, base_url: impl Into<String>, metrics: Metrics) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            metrics,
        }
    }

    /// Per-date count mapping for one agency, optionally restricted to a window.
    pub async fn fetch_daily_counts(
        &self,
        slug: &str,
        window: Option<DateWindow>,
    ) -> Result<BTreeMap<String, u64>, FetchError> {
        let mut query = slug_query(slug);
        if let Some(window) = window {
            query.push(("last_modified_on_or_after", window.start.to_string()));
            query.push(("last_modified_on_or_before", window.end.to_string()));
        }
        let body = self.get_json("daily", DAILY_COUNTS_PATH, &query).await?;
        parse_daily_counts(&body)
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let result = self.send(path, query).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.reason(),
        };
        self.metrics.record_request(endpoint, outcome);
        result
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|err| FetchError::Transient(format!("request to {path} failed: {err}")))?;

        if let Some(err) = classify_status(response.status()) {
            tracing::debug!(status = %response.status(), path, "upstream rejected request");
            return Err(err);
        }

        let body = response.bytes().await.map_err(|err| {
            FetchError::Transient(format!("failed to read body from {path}: {err}"))
        })?;
        serde_json::from_slice(&body)
            .map_err(|err| FetchError::Malformed(format!("invalid JSON from {path}: {err}")))
    }
}

impl MetricsSource for HttpMetricsClient {
    async fn list_entities(&self) -> Result<Vec<Entity>, FetchError> {
        let body = self.get_json("agencies", AGENCIES_PATH, &[]).await?;
        parse_listing(&body)
    }

    async fn fetch_scalar_count(&self, slug: &str) -> Result<u64, FetchError> {
        let body = self.get_json("count", COUNT_PATH, &slug_query(slug)).await?;
        parse_scalar_count(&body)
    }

    async fn fetch_series_total(&self, slug: &str) -> Result<u64, FetchError> {
        let dates = self.fetch_daily_counts(slug, None).await?;
        dates.values().try_fold(0u64, |total, value| {
            total
                .checked_add(*value)
                .ok_or_else(|| FetchError::Malformed("daily counts overflow u64".into()))
        })
    }
}

fn slug_query(slug: &str) -> Vec<(&'static str, String)> {
    vec![
        ("query", MATCH_ALL_QUERY.to_string()),
        (AGENCY_SLUG_PARAM, slug.to_string()),
    ]
}

fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FetchError::RateLimited)
    } else if !status.is_success() {
        Some(FetchError::Transient(format!("upstream returned {status}")))
    } else {
        None
    }
}

fn parse_listing(body: &Value) -> Result<Vec<Entity>, FetchError> {
    let raw = match body.get("agencies") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(raw)) => raw,
        Some(other) => {
            return Err(FetchError::Malformed(format!(
                "agency listing is not an array: `{other}`"
            )))
        }
    };

    let mut seen = HashSet::with_capacity(raw.len());
    let mut unique = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let entity = match Entity::deserialize(entry) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping unreadable agency entry");
                continue;
            }
        };
        if seen.insert(entity.slug.clone()) {
            unique.push(entity);
        } else {
            tracing::warn!(slug = entity.slug, "dropping duplicate agency slug");
        }
    }
    Ok(unique)
}

fn parse_scalar_count(body: &Value) -> Result<u64, FetchError> {
    let count = body.get("count").filter(|count| !count.is_null());
    if let Some(Value::Number(number)) = count {
        return whole_number(number).ok_or_else(|| {
            FetchError::Malformed(format!("count `{number}` is not a non-negative integer"))
        });
    }
    match body.get("meta").and_then(|meta| meta.get("total_count")) {
        Some(Value::Number(number)) => whole_number(number).ok_or_else(|| {
            FetchError::Malformed(format!("total_count `{number}` is not a non-negative integer"))
        }),
        Some(Value::String(text)) => whole_number_text(text).ok_or_else(|| {
            FetchError::Malformed(format!("total_count `{text}` is not a non-negative integer"))
        }),
        _ => Err(match count {
            Some(other) => FetchError::Malformed(format!("count `{other}` is not a number")),
            None => FetchError::Malformed(
                "count response carries neither `count` nor `meta.total_count`".into(),
            ),
        }),
    }
}

fn parse_daily_counts(body: &Value) -> Result<BTreeMap<String, u64>, FetchError> {
    let dates = body
        .get("dates")
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::Malformed("daily counts response lacks `dates`".into()))?;

    let mut counts = BTreeMap::new();
    for (date, value) in dates {
        let count = match value {
            Value::Number(number) => whole_number(number),
            Value::String(text) => whole_number_text(text),
            _ => None,
        }
        .ok_or_else(|| FetchError::Malformed(format!("count for {date} is `{value}`")))?;
        counts.insert(date.clone(), count);
    }
    Ok(counts)
}

/// Accepts `12` and `12.0`; rejects negatives, fractions and non-finite values.
fn whole_number(number: &Number) -> Option<u64> {
    if let Some(value) = number.as_u64() {
        return Some(value);
    }
    let value = number.as_f64()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

fn whole_number_text(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    trimmed.parse::<u64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .and_then(|number| whole_number(&number))
    })
}
