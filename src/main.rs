//! Command-line entry point: one collection run per invocation.
//!
//! ```sh
//! topic_news -s config/sources.yaml -o public/items.json
//! ```
//!
//! Exits non-zero when the registry cannot be loaded or the snapshot cannot be
//! written. Individual source failures are logged and otherwise ignored.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use topic_news::cli::Cli;
use topic_news::fetch::{FetchOptions, HttpFetcher, RetryFetch};
use topic_news::outputs::snapshot::write_snapshot;
use topic_news::pipeline::{self, RunOptions};
use topic_news::registry::Registry;
use topic_news::utils::ensure_writable_dir;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

fn run_options(args: &Cli) -> RunOptions {
    RunOptions {
        fetch: FetchOptions {
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            concurrency: args.concurrency,
            ..FetchOptions::default()
        },
        max_items: args.max_items,
        max_age: args.max_age_hours.and_then(chrono::Duration::try_hours),
        min_score: args.min_score,
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    info!(
        sources = %args.sources.display(),
        output = %args.output.display(),
        max_items = args.max_items,
        timeout_secs = args.timeout_secs,
        retries = args.retries,
        "Starting collection run"
    );

    let registry = Registry::load(&args.sources).await.map_err(|e| {
        error!(error = %e, "Could not load source registry");
        e
    })?;

    let out_dir = args
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    ensure_writable_dir(out_dir).await?;

    let opts = run_options(&args);
    let fetcher = RetryFetch::new(
        HttpFetcher::new(opts.fetch.timeout)?,
        args.retries,
        RETRY_BASE_DELAY,
    );

    let snapshot = pipeline::run(&registry, &fetcher, &opts).await;

    write_snapshot(&snapshot, &args.output).await.map_err(|e| {
        error!(error = %e, "Could not publish snapshot");
        e
    })?;

    info!(
        items = snapshot.items.len(),
        contributing_sources = snapshot.sources.len(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Collection run finished"
    );
    Ok(())
}
