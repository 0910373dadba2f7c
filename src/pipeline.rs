//! One collection run, end to end.
//!
//! ```text
//! registry ─► fetch_all ─► normalize ─► freshness ─► score ─► topic filter ─► rank ─► Snapshot
//! ```
//!
//! Fetching is the only concurrent stage. Everything after the merge runs on
//! the full in-memory collection and is deterministic for a given set of
//! fetched bodies.

use crate::fetch::{self, FetchOptions, FetchPage, SourceBatch};
use crate::models::{Article, Snapshot};
use crate::normalize::normalize;
use crate::rank::rank;
use crate::registry::Registry;
use crate::score::Scorer;
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub fetch: FetchOptions,
    /// Articles kept in the snapshot.
    pub max_items: usize,
    /// Drop dated articles older than this. Undated articles always pass.
    pub max_age: Option<Duration>,
    /// Drop articles scoring below this after scoring.
    pub min_score: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            max_items: 20,
            max_age: None,
            min_score: None,
        }
    }
}

fn normalize_batches(batches: Vec<SourceBatch>) -> Vec<Article> {
    batches
        .into_iter()
        .flat_map(|batch| {
            let source = batch.source;
            batch
                .records
                .into_iter()
                .filter_map(move |raw| normalize(&source, raw))
        })
        .collect()
}

/// `true` unless the article has a `published` time before `cutoff`.
pub fn is_fresh(article: &Article, cutoff: Option<DateTime<Utc>>) -> bool {
    match (article.published, cutoff) {
        (Some(published), Some(cutoff)) => published >= cutoff,
        _ => true,
    }
}

/// Oldest `published` time still accepted. A window reaching past the
/// earliest representable instant means no cutoff.
pub fn freshness_cutoff(now: DateTime<Utc>, max_age: Option<Duration>) -> Option<DateTime<Utc>> {
    max_age.and_then(|age| now.checked_sub_signed(age))
}

/// Fetch every registered source and reduce the results to a snapshot.
///
/// Source failures only shrink the result; this never fails.
#[instrument(level = "info", skip_all, fields(sources = registry.sources.len()))]
pub async fn run<F: FetchPage>(registry: &Registry, fetcher: &F, opts: &RunOptions) -> Snapshot {
    let t0 = Instant::now();
    let cutoff = freshness_cutoff(Utc::now(), opts.max_age);

    let batches = fetch::fetch_all(fetcher, &registry.sources, &opts.fetch).await;

    let mut articles = normalize_batches(batches);
    let normalized = articles.len();
    articles.retain(|a| is_fresh(a, cutoff));
    debug!(normalized, fresh = articles.len(), ?cutoff, "Normalized articles");

    let scorer = Scorer::new(&registry.topic);
    scorer.score_all(&mut articles);
    let scored = articles.len();
    articles.retain(|a| {
        scorer.keeps(&a.title, &a.summary) && opts.min_score.is_none_or(|min| a.score >= min)
    });
    debug!(scored, on_topic = articles.len(), min_score = ?opts.min_score, "Filtered articles");

    let ranked = rank(articles, opts.max_items);

    info!(
        normalized,
        unique = ranked.unique,
        kept = ranked.items.len(),
        contributing = ranked.sources.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Run complete"
    );
    Snapshot::new(ranked.items, ranked.sources)
}
