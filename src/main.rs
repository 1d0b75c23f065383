use anyhow::{anyhow, bail, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use agency_ranker::config::Config;
use agency_ranker::history::{self, ChangeHistory, TimeRange};
use agency_ranker::lookup::{self, AgencyCount, AgencyOption};
use agency_ranker::metrics::Metrics;
use agency_ranker::{
    build_http_client, HttpMetricsClient, RankingEngine, RankingOutcome, RetryPolicy,
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let json = take_flag(&mut args, "--json");

    let config = Config::from_env()?;
    let _telemetry = agency_ranker::telemetry::init(&config)?;

    let metrics = Metrics::new()?;
    let http = build_http_client(config.request_timeout)?;
    let client = HttpMetricsClient::new(http, config.base_url.clone(), metrics.clone());
    let retry = RetryPolicy::new(config.max_attempts, config.retry_base_delay);

    match args.first().map(String::as_str) {
        None | Some("rank") => {
            tracing::info!(
                base_url = %config.base_url,
                cap = config.entity_cap,
                concurrency = config.concurrency,
                "computing agency ranking"
            );
            let engine = RankingEngine::new(client, retry, metrics.clone());
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                    watcher.cancel();
                }
            });

            let outcome = engine
                .compute_ranking_with_cancel(config.entity_cap, config.concurrency, &cancel)
                .await;
            print_ranking(&outcome, json)?;
        }
        Some("history") => {
            let slug = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: agency-ranker history <slug> [range]"))?;
            let range = match args.get(2) {
                Some(raw) => TimeRange::from_str(raw).ok_or_else(|| {
                    anyhow!("unknown range `{raw}` (expected 1month, 6months, 1year, 5years, all)")
                })?,
                None => TimeRange::default(),
            };
            let today = chrono::Local::now().date_naive();
            let history = history::agency_history(&client, &retry, slug, range, today).await;
            print_history(&history, json)?;
        }
        Some("agencies") => {
            let directory = lookup::agency_directory(&client)
                .await
                .context("listing agencies")?;
            print_directory(&directory, json)?;
        }
        Some("count") => {
            let slug = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: agency-ranker count <slug>"))?;
            let count = lookup::agency_count(&client, &retry, slug)
                .await
                .with_context(|| format!("fetching count for `{slug}`"))?;
            print_count(&count, json)?;
        }
        Some(other) => bail!(
            "unknown subcommand `{other}` (expected `rank`, `history`, `agencies` or `count`)"
        ),
    }

    if config.print_metrics {
        print!("{}", metrics.encode_prometheus()?);
    }
    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|arg| arg != flag);
    args.len() != before
}

fn print_ranking(outcome: &RankingOutcome, json: bool) -> Result<()> {
    if json {
        let body = match outcome {
            RankingOutcome::Ranked(result) => serde_json::to_string_pretty(result),
            RankingOutcome::Fallback(fallback) => serde_json::to_string_pretty(fallback),
            RankingOutcome::Cancelled => Ok("null".to_string()),
        }
        .context("encoding ranking as JSON")?;
        println!("{body}");
        return Ok(());
    }

    match outcome {
        RankingOutcome::Cancelled => {
            println!("Ranking cancelled before completion.");
            return Ok(());
        }
        RankingOutcome::Fallback(fallback) => {
            println!("WARNING: could not compute the agency ranking; showing illustrative data.");
            println!("         ({})", fallback.reason);
        }
        RankingOutcome::Ranked(_) => {}
    }

    println!(
        "{:>3}  {:<48} {:>12} {:>12} {:>12}",
        "#", "Agency", "Word Count", "Changes", "Total"
    );
    for (index, record) in outcome.records().iter().enumerate() {
        let marker = if record.scalar_degraded || record.series_degraded {
            "*"
        } else {
            ""
        };
        println!(
            "{:>3}  {:<48} {:>12} {:>12} {:>12}{}",
            index + 1,
            record.display_name,
            record.scalar_count,
            record.series_total,
            record.score,
            marker
        );
    }
    if outcome
        .records()
        .iter()
        .any(|r| r.scalar_degraded || r.series_degraded)
    {
        println!("* one or more metrics unavailable and counted as zero");
    }
    Ok(())
}

fn print_history(history: &ChangeHistory, json: bool) -> Result<()> {
    if json {
        let body =
            serde_json::to_string_pretty(history).context("encoding change history as JSON")?;
        println!("{body}");
        return Ok(());
    }

    if history.degraded {
        println!("WARNING: change history unavailable; showing illustrative data.");
    }
    if history.points.is_empty() {
        println!(
            "No change data found for `{}` over {}.",
            history.slug, history.range
        );
        return Ok(());
    }
    println!("Changes for `{}` ({}):", history.slug, history.range);
    for point in &history.points {
        println!("    {}  {:>8}", point.date, point.count);
    }
    Ok(())
}

fn print_directory(directory: &[AgencyOption], json: bool) -> Result<()> {
    if json {
        let body = serde_json::to_string_pretty(directory).context("encoding agencies as JSON")?;
        println!("{body}");
        return Ok(());
    }

    if directory.is_empty() {
        println!("No agencies listed.");
        return Ok(());
    }
    for option in directory {
        println!("{:<40} {}", option.slug, option.label);
    }
    Ok(())
}

fn print_count(count: &AgencyCount, json: bool) -> Result<()> {
    if json {
        let body = serde_json::to_string_pretty(count).context("encoding count as JSON")?;
        println!("{body}");
    } else {
        println!("{}: {}", count.slug, count.count);
    }
    Ok(())
}
