use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;

use crate::scheduler::{DEFAULT_CONCURRENCY, DEFAULT_ENTITY_CAP};

/// Application configuration derived from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub request_timeout: Duration,
    pub entity_cap: usize,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub print_metrics: bool,
    pub otel: OtelConfig,
}

/// OpenTelemetry configuration derived from environment variables.
#[derive(Clone, Debug)]
pub struct OtelConfig {
    pub exporter: OtelExporter,
    pub service_name: String,
}

/// Supported OpenTelemetry exporters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtelExporter {
    None,
    Stdout,
    OtlpHttp { endpoint: String },
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = parse_env("RANKER_BASE_URL", "https://www.ecfr.gov", parse_base_url)?;
        let request_timeout = clamp_duration(
            parse_env("RANKER_REQUEST_TIMEOUT_SECS", "10", parse_duration_secs)?,
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        let entity_cap = parse_env(
            "RANKER_ENTITY_CAP",
            &DEFAULT_ENTITY_CAP.to_string(),
            parse_usize,
        )?
        .clamp(1, 1000);
        let concurrency = parse_env(
            "RANKER_CONCURRENCY",
            &DEFAULT_CONCURRENCY.to_string(),
            parse_usize,
        )?
        .clamp(1, 50);
        let max_attempts = parse_env("RANKER_MAX_ATTEMPTS", "3", parse_u32)?.clamp(1, 10);
        let retry_base_delay = clamp_duration(
            parse_env("RANKER_RETRY_BASE_DELAY_MS", "500", parse_duration_millis)?,
            Duration::ZERO,
            Duration::from_secs(10),
        );
        let print_metrics = parse_env("RANKER_PRINT_METRICS", "false", parse_bool)?;
        let otel_service_name =
            parse_env("RANKER_OTEL_SERVICE_NAME", "agency-ranker", parse_string)?
                .trim()
                .to_string();
        let otel_exporter_raw = env::var("RANKER_OTEL_EXPORTER")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "none".to_string());
        let otel_endpoint = env::var("RANKER_OTEL_ENDPOINT").ok().and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        });
        let otel_exporter = parse_otel_exporter(&otel_exporter_raw, otel_endpoint)?;

        Ok(Self {
            base_url,
            request_timeout,
            entity_cap,
            concurrency,
            max_attempts,
            retry_base_delay,
            print_metrics,
            otel: OtelConfig {
                exporter: otel_exporter,
                service_name: otel_service_name,
            },
        })
    }
}

fn clamp_duration(value: Duration, min: Duration, max: Duration) -> Duration {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

fn parse_base_url(input: &str) -> Result<String> {
    let url = Url::parse(input.trim()).with_context(|| format!("invalid base URL `{input}`"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("base URL `{input}` must use http or https"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_duration_secs(input: &str) -> Result<Duration> {
    let secs: u64 = input
        .parse()
        .with_context(|| format!("invalid duration seconds `{input}`"))?;
    Ok(Duration::from_secs(secs))
}

fn parse_duration_millis(input: &str) -> Result<Duration> {
    let ms: u64 = input
        .parse()
        .with_context(|| format!("invalid duration milliseconds `{input}`"))?;
    Ok(Duration::from_millis(ms))
}

fn parse_usize(input: &str) -> Result<usize> {
    input
        .parse::<usize>()
        .with_context(|| format!("invalid integer value `{input}`"))
}

fn parse_u32(input: &str) -> Result<u32> {
    input
        .parse::<u32>()
        .with_context(|| format!("invalid integer value `{input}`"))
}

fn parse_bool(input: &str) -> Result<bool> {
    match input.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(anyhow!("invalid boolean `{input}`")),
    }
}

fn parse_string(input: &str) -> Result<String> {
    Ok(input.to_string())
}

fn parse_otel_exporter(value: &str, endpoint: Option<String>) -> Result<OtelExporter> {
    match value.to_ascii_lowercase().as_str() {
        "" | "none" => Ok(OtelExporter::None),
        "stdout" => Ok(OtelExporter::Stdout),
        "otlp_http" | "otlp-http" => {
            let endpoint = endpoint.ok_or_else(|| {
                anyhow!("RANKER_OTEL_ENDPOINT must be set when RANKER_OTEL_EXPORTER=otlp_http")
            })?;
            Ok(OtelExporter::OtlpHttp { endpoint })
        }
        other => Err(anyhow!("unsupported OTLP exporter `{other}`")),
    }
}

fn parse_env<T, F>(key: &str, default: &str, parser: F) -> Result<T>
where
    F: Fn(&str) -> Result<T>,
{
    match env::var(key).ok().filter(|value| !value.is_empty()) {
        Some(value) => parser(&value),
        None => parser(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        assert_eq!(
            parse_base_url("https://www.ecfr.gov/").unwrap(),
            "https://www.ecfr.gov"
        );
        assert_eq!(
            parse_base_url("http://localhost:5173/proxy/").unwrap(),
            "http://localhost:5173/proxy"
        );
        assert!(parse_base_url("ftp://www.ecfr.gov").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn durations_are_clamped() {
        let clamped = clamp_duration(
            Duration::from_secs(120),
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        assert_eq!(clamped, Duration::from_secs(60));
        let clamped = clamp_duration(
            Duration::ZERO,
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        assert_eq!(clamped, Duration::from_secs(1));
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert!(parse_bool("YES").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn otlp_exporter_requires_endpoint() {
        let err = parse_otel_exporter("otlp_http", None).unwrap_err();
        assert!(err.to_string().contains("RANKER_OTEL_ENDPOINT"));
        assert_eq!(
            parse_otel_exporter("otlp-http", Some("http://collector:4318".into())).unwrap(),
            OtelExporter::OtlpHttp {
                endpoint: "http://collector:4318".into()
            }
        );
        assert_eq!(parse_otel_exporter("", None).unwrap(), OtelExporter::None);
        assert!(parse_otel_exporter("jaeger", None).is_err());
    }
}
