use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::client::MetricsSource;
use crate::errors::FetchError;
use crate::model::Entity;

pub(crate) fn entities(slugs: &[&str]) -> Vec<Entity> {
    slugs
        .iter()
        .map(|slug| Entity::new(*slug, slug.to_uppercase()))
        .collect()
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
enum Metric {
    Scalar,
    Series,
}

type Script = VecDeque<Result<u64, FetchError>>;

/// In-memory source that replays scripted responses per slug and metric.
/// Unscripted calls answer `Ok(0)`.
pub(crate) struct ScriptedSource {
    listing: Result<Vec<Entity>, FetchError>,
    scripts: Mutex<HashMap<(Metric, String), Script>>,
    calls: Mutex<HashMap<(Metric, String), usize>>,
    listing_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    cancel_on_call: Mutex<Option<CancellationToken>>,
}

impl ScriptedSource {
    pub(crate) fn new(slugs: &[&str]) -> Self {
        Self {
            listing: Ok(entities(slugs)),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            listing_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cancel_on_call: Mutex::new(None),
        }
    }

    pub(crate) fn failing_listing(err: FetchError) -> Self {
        let mut source = Self::new(&[]);
        source.listing = Err(err);
        source
    }

    pub(crate) fn scalar(self, slug: &str, responses: Vec<Result<u64, FetchError>>) -> Self {
        self.script(Metric::Scalar, slug, responses)
    }

    pub(crate) fn series(self, slug: &str, responses: Vec<Result<u64, FetchError>>) -> Self {
        self.script(Metric::Series, slug, responses)
    }

    fn script(self, metric: Metric, slug: &str, responses: Vec<Result<u64, FetchError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((metric, slug.to_string()), responses.into());
        self
    }

    pub(crate) fn cancel_after_first_call(&self, token: CancellationToken) {
        *self.cancel_on_call.lock().unwrap() = Some(token);
    }

    pub(crate) fn slugs(&self) -> Vec<&str> {
        match &self.listing {
            Ok(listing) => listing.iter().map(|e| e.slug.as_str()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub(crate) fn calls_for(&self, slug: &str) -> usize {
        self.count(Metric::Scalar, slug) + self.count(Metric::Series, slug)
    }

    pub(crate) fn scalar_calls_for(&self, slug: &str) -> usize {
        self.count(Metric::Scalar, slug)
    }

    pub(crate) fn total_fetches(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn count(&self, metric: Metric, slug: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(metric, slug.to_string()))
            .copied()
            .unwrap_or(0)
    }

    async fn next(&self, metric: Metric, slug: &str) -> Result<u64, FetchError> {
        let key = (metric, slug.to_string());
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        let response = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(0));
        if let Some(token) = self.cancel_on_call.lock().unwrap().take() {
            token.cancel();
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

impl MetricsSource for ScriptedSource {
    async fn list_entities(&self) -> Result<Vec<Entity>, FetchError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.listing.clone()
    }

    async fn fetch_scalar_count(&self, slug: &str) -> Result<u64, FetchError> {
        self.next(Metric::Scalar, slug).await
    }

    async fn fetch_series_total(&self, slug: &str) -> Result<u64, FetchError> {
        self.next(Metric::Series, slug).await
    }
}
