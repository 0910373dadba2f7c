//! Per-source fetching with failure isolation.
//!
//! Every source goes through the same path:
//!
//! 1. **Download**: the endpoint body is retrieved through a [`FetchPage`]
//!    implementation, normally [`RetryFetch`] wrapping [`HttpFetcher`]
//! 2. **Extract**: the body is handed to [`syndication`] or [`scrape`]
//!    depending on the source's [`Strategy`]
//!
//! # Failure isolation
//!
//! [`fetch_source`] never returns an error. Timeouts, transport errors,
//! non-2xx statuses and unparseable documents are logged and turn into an
//! empty record list for that source only.
//!
//! # Concurrency
//!
//! [`fetch_all`] runs sources concurrently through `futures::stream`, bounded
//! by the number of distinct endpoint hosts unless overridden. Results come
//! back in registry order regardless of which source finishes first.

pub mod scrape;
pub mod syndication;

use crate::models::{RawRecord, Source, Strategy};
use futures::stream::{self, StreamExt};
use rand::{Rng, rng};
use reqwest::Client;
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// User-agent sent with every request.
pub const USER_AGENT: &str = concat!(
    "topic_news/",
    env!("CARGO_PKG_VERSION"),
    " (news aggregation bot; one request per source per run)"
);

/// Why a single source produced nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unparseable document: {0}")]
    Parse(String),
}

impl FetchError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Timeout(_) | FetchError::Parse(_) => false,
        }
    }
}

/// Trait for async page retrieval.
///
/// Implementors return the body of a successful response, or an error for
/// anything else. This abstraction lets the pipeline run against scripted
/// responses in tests and lets decorators like [`RetryFetch`] wrap any client.
pub trait FetchPage {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Plain HTTP fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client with the crate's [`USER_AGENT`] and a request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        debug!(bytes = body.len(), "Fetched body");
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchPage`] implementation.
///
/// Only errors for which [`FetchError::is_retryable`] holds are retried.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    /// Wrap `inner`, allowing up to `max_retries` extra attempts per request.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl<T> RetryFetch<T> {
    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt > self.max_retries {
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Knobs for one fetch pass.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Budget for one source, retries included.
    pub timeout: Duration,
    /// Raw records kept per source, in document order.
    pub max_items_per_source: usize,
    /// Concurrent sources; `None` means one slot per distinct endpoint host.
    pub concurrency: Option<usize>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_items_per_source: 50,
            concurrency: None,
        }
    }
}

/// Records pulled from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    pub source: String,
    pub records: Vec<RawRecord>,
}

async fn fetch_records<F: FetchPage>(
    fetcher: &F,
    source: &Source,
) -> Result<Vec<RawRecord>, FetchError> {
    let body = fetcher.fetch(&source.endpoint).await?;
    match &source.strategy {
        Strategy::Syndication => syndication::parse_feed(&body),
        Strategy::Scrape(rules) => Ok(scrape::extract_items(&body, &source.endpoint, rules)),
    }
}

/// Fetch and extract one source. Any failure yields an empty list.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn fetch_source<F: FetchPage>(
    fetcher: &F,
    source: &Source,
    opts: &FetchOptions,
) -> Vec<RawRecord> {
    let t0 = Instant::now();
    let result = match timeout(opts.timeout, fetch_records(fetcher, source)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(opts.timeout)),
    };

    match result {
        Ok(mut records) => {
            records.truncate(opts.max_items_per_source);
            info!(
                count = records.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Fetched source"
            );
            records
        }
        Err(e) => {
            error!(endpoint = %source.endpoint, error = %e, "Source failed; contributing no items");
            Vec::new()
        }
    }
}

/// Number of distinct hosts among the sources' endpoints, at least one.
pub fn distinct_hosts(sources: &[Source]) -> usize {
    sources
        .iter()
        .filter_map(|s| s.endpoint.host_str())
        .collect::<HashSet<_>>()
        .len()
        .max(1)
}

/// Fetch every source concurrently. Output order matches `sources`.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn fetch_all<F: FetchPage>(
    fetcher: &F,
    sources: &[Source],
    opts: &FetchOptions,
) -> Vec<SourceBatch> {
    let workers = opts.concurrency.unwrap_or_else(|| distinct_hosts(sources)).max(1);
    debug!(workers, "Starting fetch pass");

    let batches: Vec<SourceBatch> = stream::iter(sources)
        .map(|source| async move {
            SourceBatch {
                source: source.name.clone(),
                records: fetch_source(fetcher, source, opts).await,
            }
        })
        .buffered(workers)
        .collect()
        .await;

    let total: usize = batches.iter().map(|b| b.records.len()).sum();
    let failed = batches.iter().filter(|b| b.records.is_empty()).count();
    info!(total, empty_sources = failed, "Fetch pass complete");
    batches
}
