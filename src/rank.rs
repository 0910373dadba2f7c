//! Ordering, deduplication and truncation of scored articles.
//!
//! The order of operations matters: [`sort_by_relevance`] must run before
//! [`dedupe`], because dedupe keeps the *first* article seen for each title.
//! Sorting first makes that the best-ranked copy. [`rank`] bundles the three
//! steps in the only valid order.

use crate::models::Article;
use crate::normalize::clean_text;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Total order: score descending, then `published` descending with unknown
/// timestamps last.
pub fn relevance_order(a: &Article, b: &Article) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.published.cmp(&a.published))
}

/// Stable sort by [`relevance_order`]; equal articles keep their input order.
pub fn sort_by_relevance(articles: &mut [Article]) {
    articles.sort_by(relevance_order);
}

/// Key under which two titles count as the same story.
///
/// Cleans the title again, lower-cases it and drops punctuation, so
/// `"Purdue wins!"` and `"purdue   WINS!!"` share a key.
pub fn title_key(title: &str) -> String {
    let cleaned = clean_text(title).to_lowercase();
    cleaned
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep the first article for each [`title_key`]; drop articles whose key is empty.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| {
            let key = title_key(&article.title);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Result of [`rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    /// At most `max_items` articles, best first.
    pub items: Vec<Article>,
    /// Sorted distinct sources among the deduplicated articles, before truncation.
    pub sources: Vec<String>,
    /// Articles left after dedupe, before truncation.
    pub unique: usize,
}

/// Sort, dedupe, then keep at most `max_items` articles.
pub fn rank(mut articles: Vec<Article>, max_items: usize) -> Ranked {
    sort_by_relevance(&mut articles);
    let mut items = dedupe(articles);
    let sources = items
        .iter()
        .map(|a| a.source.clone())
        .unique()
        .sorted()
        .collect();
    let unique = items.len();
    items.truncate(max_items);
    Ranked {
        items,
        sources,
        unique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn article(title: &str, score: f64, published: Option<DateTime<Utc>>) -> Article {
        Article {
            id: crate::normalize::fingerprint("", title),
            source: "Test".to_string(),
            title: title.to_string(),
            summary: String::new(),
            url: String::new(),
            published,
            score,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_score_then_recency_order() {
        let t = now();
        let input = vec![
            article("c", 2.0, None),
            article("b", 5.0, Some(t - Duration::hours(2))),
            article("a", 5.0, Some(t - Duration::hours(1))),
        ];
        let ranked = rank(input, 10).items;
        let titles: Vec<_> = ranked.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_absent_timestamp_sorts_oldest() {
        let t = now();
        let mut input = vec![
            article("undated", 3.0, None),
            article("ancient", 3.0, Some(t - Duration::days(3650))),
        ];
        sort_by_relevance(&mut input);
        assert_eq!(input[0].title, "ancient");
        assert_eq!(input[1].title, "undated");
    }

    #[test]
    fn test_full_ties_keep_input_order() {
        let input = vec![article("first", 1.0, None), article("second", 1.0, None)];
        let ranked = rank(input, 10).items;
        assert_eq!(ranked[0].title, "first");
        assert_eq!(ranked[1].title, "second");
    }

    #[test]
    fn test_title_key_ignores_case_spacing_punctuation() {
        assert_eq!(title_key("Purdue wins!"), "purdue wins");
        assert_eq!(title_key("purdue   WINS!!"), "purdue wins");
        assert_eq!(title_key("Purdue&nbsp;wins"), "purdue wins");
        assert_eq!(title_key("!!!"), "");
    }

    #[test]
    fn test_dedupe_keeps_higher_scored_duplicate_after_sort() {
        let input = vec![
            article("purdue   WINS!!", 2.0, Some(now())),
            article("Purdue wins!", 7.0, None),
        ];
        let ranked = rank(input, 10).items;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "Purdue wins!");
        assert_eq!(ranked[0].score, 7.0);
    }

    #[test]
    fn test_dedupe_tie_keeps_more_recent() {
        let t = now();
        let input = vec![
            article("Purdue wins!", 5.0, Some(t - Duration::hours(5))),
            article("purdue   WINS!!", 5.0, Some(t)),
        ];
        let ranked = rank(input, 10).items;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "purdue   WINS!!");
    }

    #[test]
    fn test_dedupe_before_sort_would_pick_wrong_copy() {
        // dedupe alone is order-sensitive; only the sorted pipeline keeps the best copy
        let input = vec![article("Same story", 1.0, None), article("same story", 9.0, None)];
        let unsorted = dedupe(input.clone());
        assert_eq!(unsorted[0].score, 1.0);
        let ranked = rank(input, 10).items;
        assert_eq!(ranked[0].score, 9.0);
    }

    #[test]
    fn test_dedupe_drops_empty_titles() {
        let input = vec![article("", 9.0, None), article("  ...  ", 9.0, None), article("Real", 1.0, None)];
        let out = dedupe(input);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Real");
    }

    #[test]
    fn test_truncates_to_first_n_of_ranked() {
        let t = now();
        let input: Vec<Article> = (0..50)
            .map(|i| article(&format!("story {i}"), (i % 7) as f64, Some(t - Duration::minutes(i))))
            .collect();

        let mut full = input.clone();
        sort_by_relevance(&mut full);

        let ranked = rank(input, 20).items;
        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked, full[..20].to_vec());
    }

    #[test]
    fn test_sources_counted_before_truncation() {
        let mut low = article("Low story", 1.0, None);
        low.source = "Wire".to_string();
        let mut high = article("High story", 9.0, None);
        high.source = "Hammer & Rails".to_string();
        let mut dup = article("high STORY", 2.0, None);
        dup.source = "Dupes Daily".to_string();

        let ranked = rank(vec![low, dup, high], 1);
        assert_eq!(ranked.items.len(), 1);
        assert_eq!(ranked.unique, 2);
        assert_eq!(ranked.sources, vec!["Hammer & Rails", "Wire"]);
    }

    #[test]
    fn test_truncate_larger_than_input() {
        let ranked = rank(vec![article("only", 1.0, None)], 20).items;
        assert_eq!(ranked.len(), 1);
    }
}
