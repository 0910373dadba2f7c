//! Data models for sources, extracted records, articles and snapshots.
//!
//! This module defines the core data structures that flow through the pipeline:
//! - [`Source`]: A configured origin of articles and its extraction [`Strategy`]
//! - [`RawRecord`]: Fields pulled out of a feed entry or HTML item, pre-normalization
//! - [`Article`]: The canonical, cleaned and scored unit
//! - [`Snapshot`]: The document published at the end of a run
//!
//! Only [`Article`] and [`Snapshot`] are serialized; their JSON shape is the
//! contract with the presentation layer.

use chrono::{DateTime, Utc};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

/// A configured origin of articles.
///
/// Sources are loaded once per run from the registry and never mutated.
#[derive(Debug, Clone)]
pub struct Source {
    /// Display name, also used for source-trust scoring.
    pub name: String,
    /// The feed or page URL.
    pub endpoint: Url,
    /// How raw records are pulled out of the endpoint's body.
    pub strategy: Strategy,
}

/// Extraction strategy of a source.
///
/// The set is closed: a new kind of source is a new variant here plus a
/// matching arm in [`crate::fetch`].
#[derive(Debug, Clone)]
pub enum Strategy {
    /// RSS 2.0, RSS 1.0 (RDF) or Atom document.
    Syndication,
    /// HTML page walked with CSS selectors.
    Scrape(ScrapeRules),
}

/// Compiled CSS selectors for a scrape source.
///
/// `item` selects repeated containers; the other selectors are evaluated
/// inside each container.
#[derive(Debug, Clone)]
pub struct ScrapeRules {
    pub item: Selector,
    /// Falls back to the container's own text when absent.
    pub title: Option<Selector>,
    pub summary: Option<Selector>,
    /// Falls back to the container's `href`, then its first `a[href]`.
    pub link: Option<Selector>,
    pub time: Option<Selector>,
}

/// Fields extracted from one feed entry or HTML item.
///
/// Text is still raw here (entities, markup, stray whitespace). Timestamps are
/// kept as candidates in preference order: `timestamp_raw` first, then
/// `timestamp_alt` if the first one does not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub title: String,
    pub summary: String,
    /// Absolute link, or empty when the item had none.
    pub link: String,
    pub timestamp_raw: Option<String>,
    pub timestamp_alt: Option<String>,
}

impl RawRecord {
    /// `true` when the record carries no title and no summary text.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.summary.trim().is_empty()
    }
}

/// A normalized article.
///
/// `id` is a fingerprint of `url` and `title` only, so the same story fetched
/// on a later run maps to the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub source: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    /// Serialized as an RFC 3339 instant, or `null` when unknown.
    pub published: Option<DateTime<Utc>>,
    /// Relevance score. Internal to ranking and not published.
    #[serde(skip)]
    pub score: f64,
}

/// The published result of one run.
///
/// Every run writes a complete snapshot; nothing is merged with the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    /// Ranked, deduplicated and truncated articles.
    pub items: Vec<Article>,
    /// Sorted names of the sources that contributed at least one ranked article.
    pub sources: Vec<String>,
}

impl Snapshot {
    /// Build a snapshot stamped with the current instant.
    pub fn new(items: Vec<Article>, sources: Vec<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            items,
            sources,
        }
    }
}
