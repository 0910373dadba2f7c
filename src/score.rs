//! Keyword relevance scoring.
//!
//! Scores are additive over three tiers:
//!
//! | Signal | Weight | Applied |
//! |--------|--------|---------|
//! | Primary keyword in title/summary | [`PRIMARY_WEIGHT`] | per keyword present |
//! | Trusted outlet in source name | [`TRUSTED_SOURCE_BONUS`] | once |
//! | Contextual keyword in title/summary | [`CONTEXTUAL_WEIGHT`] | per keyword present |
//!
//! All matching is case-insensitive substring matching. A keyword counts once
//! no matter how often it occurs.
//!
//! Scores never go negative. Off-topic stories (other sports, the women's
//! team) are not penalized; [`Scorer::keeps`] rejects them outright when their
//! text contains one of the topic's `exclude` terms.

use crate::models::Article;
use serde::{Deserialize, Serialize};

pub const PRIMARY_WEIGHT: f64 = 5.0;
pub const TRUSTED_SOURCE_BONUS: f64 = 2.0;
pub const CONTEXTUAL_WEIGHT: f64 = 1.0;

/// Keyword sets defining the topic being collected.
///
/// Loaded from the `topic` block of the source registry. Any list left out
/// of the file falls back to the Purdue men's basketball defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    /// Entity names, key personnel, venues and nicknames.
    pub primary: Vec<String>,
    /// Parent league and competition terms.
    pub contextual: Vec<String>,
    /// Name fragments of outlets dedicated to the topic.
    pub trusted_sources: Vec<String>,
    /// Terms that mark a story as off-topic regardless of its score.
    pub exclude: Vec<String>,
}

impl Default for Topic {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            primary: owned(&[
                "purdue",
                "boilermaker",
                "boilers",
                "matt painter",
                "braden smith",
                "fletcher loyer",
                "trey kaufman-renn",
                "mackey arena",
                "boiler ball",
            ]),
            contextual: owned(&[
                "big ten",
                "ncaa",
                "college basketball",
                "men's basketball",
                "men\u{2019}s basketball",
                "march madness",
                "final four",
            ]),
            trusted_sources: owned(&[
                "hammer & rails",
                "hammer and rails",
                "goldandblack",
                "gold and black",
                "on3",
                "247sports",
                "purduesports",
                "journal & courier",
            ]),
            exclude: owned(&[
                "football",
                "volleyball",
                "soccer",
                "softball",
                "baseball",
                "wrestling",
                "women's basketball",
                "women\u{2019}s basketball",
                "wbb",
            ]),
        }
    }
}

/// Pure scoring function over a [`Topic`].
///
/// Keywords are lower-cased once at construction.
#[derive(Debug, Clone)]
pub struct Scorer {
    primary: Vec<String>,
    contextual: Vec<String>,
    trusted_sources: Vec<String>,
    exclude: Vec<String>,
}

fn lowered(xs: &[String]) -> Vec<String> {
    xs.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Scorer {
    pub fn new(topic: &Topic) -> Self {
        Self {
            primary: lowered(&topic.primary),
            contextual: lowered(&topic.contextual),
            trusted_sources: lowered(&topic.trusted_sources),
            exclude: lowered(&topic.exclude),
        }
    }

    /// `false` if the title or summary mentions an excluded term.
    pub fn keeps(&self, title: &str, summary: &str) -> bool {
        let text = format!("{title} {summary}").to_lowercase();
        !self.exclude.iter().any(|term| text.contains(term.as_str()))
    }

    /// Relevance of a piece of text from a given source. Never negative.
    pub fn score(&self, title: &str, summary: &str, source: &str) -> f64 {
        let text = format!("{title} {summary}").to_lowercase();
        let source = source.to_lowercase();

        let hits = |keywords: &[String], haystack: &str| {
            keywords.iter().filter(|k| haystack.contains(k.as_str())).count() as f64
        };

        let mut score = PRIMARY_WEIGHT * hits(&self.primary, &text)
            + CONTEXTUAL_WEIGHT * hits(&self.contextual, &text);
        if hits(&self.trusted_sources, &source) > 0.0 {
            score += TRUSTED_SOURCE_BONUS;
        }
        score
    }

    /// Set `score` on every article. Other fields are left untouched.
    pub fn score_all(&self, articles: &mut [Article]) {
        for article in articles.iter_mut() {
            article.score = self.score(&article.title, &article.summary, &article.source);
        }
    }
}
