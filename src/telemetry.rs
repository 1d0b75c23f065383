use anyhow::{anyhow, Context, Result};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::{self, SdkTracerProvider};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{Config, OtelExporter};

const TRACER_NAME: &str = "agency-ranker";
const DEFAULT_FILTER: &str = "agency_ranker=info,reqwest=warn";

/// Guard that flushes OpenTelemetry exporters on drop.
#[derive(Default)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(error) = provider.shutdown() {
                tracing::warn!(?error, "failed to shutdown OpenTelemetry tracer provider");
            }
        }
    }
}

/// Initialise tracing subscribers and optional OpenTelemetry exporters.
///
/// Logs go to stderr so that ranking output on stdout stays machine-readable.
pub fn init(config: &Config) -> Result<TelemetryGuard> {
    let provider = match &config.otel.exporter {
        OtelExporter::None => None,
        OtelExporter::Stdout => Some(
            build_stdout_provider(&config.otel.service_name)
                .context("initialising stdout tracer")?,
        ),
        OtelExporter::OtlpHttp { endpoint } => Some(
            build_otlp_provider(endpoint, &config.otel.service_name).with_context(|| {
                format!("initialising OTLP exporter with endpoint `{endpoint}`")
            })?,
        ),
    };

    let otel_layer = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME)));

    Registry::default()
        .with(build_env_filter()?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(otel_layer)
        .try_init()
        .map_err(|err| anyhow!("initialising tracing subscriber failed: {err}"))?;

    if let Some(provider) = provider.as_ref() {
        let _ = global::set_tracer_provider(provider.clone());
    }
    Ok(TelemetryGuard { provider })
}

fn build_env_filter() -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|err| anyhow!("building tracing filter failed: {err}"))
}

fn build_stdout_provider(service_name: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_stdout::SpanExporter::default();
    let provider = trace::SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .with_resource(service_resource(service_name))
        .build();
    Ok(provider)
}

fn build_otlp_provider(endpoint: &str, service_name: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint.to_string())
        .build()
        .context("building OTLP span exporter")?;

    let provider = trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(service_resource(service_name))
        .build();
    Ok(provider)
}

fn service_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .build()
}
