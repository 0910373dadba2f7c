//! Structural HTML extraction for pages without a feed.
//!
//! A page is parsed once with `scraper`; every element matching the source's
//! `item` selector becomes one candidate record. Inside each item:
//!
//! - **title**: text of the first `title` match, or the item's own text
//! - **summary**: text of the first `summary` match, or empty
//! - **link**: `href` of the first `link` match, else the item's own `href`,
//!   else its first `a[href]`; resolved against the page URL
//! - **time**: `datetime` attribute of the first `time` match, with its visible
//!   text as the fallback candidate
//!
//! Items without any title or summary text are dropped here.

use crate::models::{RawRecord, ScrapeRules};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Concatenated text nodes; whitespace is collapsed later by `clean_text`.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn first_text(item: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    selector.and_then(|s| item.select(s).next()).map(text_of)
}

fn resolve(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    base.join(href).map(|u| u.to_string()).unwrap_or_default()
}

fn find_link(item: ElementRef<'_>, rules: &ScrapeRules) -> Option<String> {
    match &rules.link {
        Some(selector) => item
            .select(selector)
            .find_map(|el| el.value().attr("href"))
            .map(str::to_string),
        None => item
            .value()
            .attr("href")
            .or_else(|| item.select(&ANCHOR).find_map(|el| el.value().attr("href")))
            .map(str::to_string),
    }
}

fn find_time(item: ElementRef<'_>, rules: &ScrapeRules) -> (Option<String>, Option<String>) {
    let Some(el) = rules.time.as_ref().and_then(|s| item.select(s).next()) else {
        return (None, None);
    };
    let visible = Some(text_of(el)).filter(|t| !t.trim().is_empty());
    match el.value().attr("datetime").filter(|v| !v.trim().is_empty()) {
        Some(machine) => (Some(machine.to_string()), visible),
        None => (visible, None),
    }
}

fn extract_item(item: ElementRef<'_>, base: &Url, rules: &ScrapeRules) -> Option<RawRecord> {
    let title = match &rules.title {
        Some(selector) => first_text(item, Some(selector)).unwrap_or_default(),
        None => text_of(item),
    };
    let summary = first_text(item, rules.summary.as_ref()).unwrap_or_default();
    let link = find_link(item, rules)
        .map(|href| resolve(base, &href))
        .unwrap_or_default();
    let (timestamp_raw, timestamp_alt) = find_time(item, rules);

    let record = RawRecord {
        title,
        summary,
        link,
        timestamp_raw,
        timestamp_alt,
    };
    (!record.is_blank()).then_some(record)
}

/// Extract records from an HTML page. Never fails; markup that yields no
/// matches simply produces no records.
pub fn extract_items(html: &str, page_url: &Url, rules: &ScrapeRules) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let mut matched = 0usize;
    let records: Vec<RawRecord> = document
        .select(&rules.item)
        .inspect(|_| matched += 1)
        .filter_map(|item| extract_item(item, page_url, rules))
        .collect();
    debug!(matched, kept = records.len(), %page_url, "Scraped page");
    records
}
