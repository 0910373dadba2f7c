//! Conversion of raw extracted records into canonical [`Article`]s.
//!
//! - Text: markup stripped, HTML entities decoded, whitespace collapsed
//! - Timestamps: tried against a fixed, ordered list of formats
//! - Links: fragment and `utm_*` tracking parameters removed
//! - Identity: SHA-256 fingerprint of `url|title`

use crate::models::{Article, RawRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static RE_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)</?[a-z!][^>]*>").expect("valid tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Clean a fragment of feed or page text for display.
///
/// Entities are decoded first so escaped markup inside feed descriptions is
/// stripped along with literal markup.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

type TimestampParser = fn(&str) -> Option<DateTime<Utc>>;

/// Timestamp formats in the order they are tried. First full match wins.
const TIMESTAMP_PARSERS: &[TimestampParser] = &[
    parse_rfc3339,
    parse_iso_compact_offset,
    parse_iso_naive,
    parse_spaced_offset,
    parse_spaced_naive,
    parse_rfc2822,
    parse_date_only,
];

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// ISO-8601 with an offset like `+0000`.
fn parse_iso_compact_offset(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ISO-8601 without offset, read as UTC.
fn parse_iso_naive(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_spaced_offset(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_spaced_naive(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// RFC 822 / 2822 dates as used by RSS `pubDate`.
fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Bare date, midnight UTC.
fn parse_date_only(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a raw timestamp string, or `None` if no known format matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    TIMESTAMP_PARSERS.iter().find_map(|parse| parse(s))
}

/// Remove the fragment and `utm_*` query parameters from a link.
///
/// Empty and unparseable links are returned trimmed but otherwise untouched.
pub fn canonical_url(link: &str) -> String {
    let link = link.trim();
    let Ok(mut url) = Url::parse(link) else {
        return link.to_string();
    };
    url.set_fragment(None);

    let has_tracking = url.query_pairs().any(|(k, _)| k.starts_with("utm_"));
    if has_tracking {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !k.starts_with("utm_"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    url.to_string()
}

/// Hex SHA-256 of `url + "|" + title`.
pub fn fingerprint(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hex::encode(hasher.finalize())
}

/// Turn a raw record into an article, or `None` if it has no text at all.
///
/// The returned article has a zero score.
pub fn normalize(source: &str, raw: RawRecord) -> Option<Article> {
    let title = clean_text(&raw.title);
    let summary = clean_text(&raw.summary);
    if title.is_empty() && summary.is_empty() {
        return None;
    }

    let published = raw
        .timestamp_raw
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| raw.timestamp_alt.as_deref().and_then(parse_timestamp));

    let url = canonical_url(&raw.link);
    let id = fingerprint(&url, &title);

    Some(Article {
        id,
        source: source.to_string(),
        title,
        summary,
        url,
        published,
        score: 0.0,
    })
}
