use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry as PromRegistry, TextEncoder,
};

static TEXT_ENCODER: Lazy<TextEncoder> = Lazy::new(TextEncoder::new);

#[derive(Clone)]
pub struct Metrics {
    upstream_requests: IntCounterVec,
    degraded_metrics: IntCounterVec,
    runs: IntCounterVec,
    run_duration: Histogram,
    prometheus_registry: PromRegistry,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let prometheus_registry = PromRegistry::new_custom(Some("agency_ranker".into()), None)?;

        let upstream_requests = IntCounterVec::new(
            Opts::new("upstream_requests_total", "Upstream metrics calls by outcome"),
            &["endpoint", "outcome"],
        )?;
        let degraded_metrics = IntCounterVec::new(
            Opts::new(
                "degraded_metrics_total",
                "Per-entity metrics zero-filled after a failed fetch",
            ),
            &["metric", "reason"],
        )?;
        let runs = IntCounterVec::new(
            Opts::new("runs_total", "Ranking runs by terminal state"),
            &["outcome"],
        )?;
        let run_duration = Histogram::with_opts(
            HistogramOpts::new("run_duration_seconds", "Wall-clock time of a ranking run")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        prometheus_registry.register(Box::new(upstream_requests.clone()))?;
        prometheus_registry.register(Box::new(degraded_metrics.clone()))?;
        prometheus_registry.register(Box::new(runs.clone()))?;
        prometheus_registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            upstream_requests,
            degraded_metrics,
            runs,
            run_duration,
            prometheus_registry,
        })
    }

    pub fn record_request(&self, endpoint: &str, outcome: &str) {
        self.upstream_requests
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    pub fn record_degraded(&self, metric: &str, reason: &str) {
        self.degraded_metrics
            .with_label_values(&[metric, reason])
            .inc();
    }

    pub fn record_run(&self, outcome: &str, elapsed: Duration) {
        self.runs.with_label_values(&[outcome]).inc();
        self.run_duration.observe(elapsed.as_secs_f64());
    }

    pub fn request_count(&self, endpoint: &str, outcome: &str) -> u64 {
        self.upstream_requests
            .with_label_values(&[endpoint, outcome])
            .get()
    }

    pub fn degraded_count(&self, metric: &str, reason: &str) -> u64 {
        self.degraded_metrics
            .with_label_values(&[metric, reason])
            .get()
    }

    pub fn run_count(&self, outcome: &str) -> u64 {
        self.runs.with_label_values(&[outcome]).get()
    }

    pub fn encode_prometheus(&self) -> Result<String> {
        let metric_families = self.prometheus_registry.gather();
        let mut buffer = Vec::new();
        TEXT_ENCODER.encode(&metric_families, &mut buffer)?;
        let output = String::from_utf8(buffer)?;
        Ok(output)
    }
}
