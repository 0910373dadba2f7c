//! RSS and Atom feed extraction.
//!
//! Documents are deserialized with `quick-xml`'s serde support. RSS 2.0 and
//! RSS 1.0 (RDF) share one model since they differ mostly in where `<item>`
//! lives; Atom has its own.
//!
//! # Timestamp preference
//!
//! | Format | `timestamp_raw` | `timestamp_alt` |
//! |--------|-----------------|-----------------|
//! | RSS 2.0 | `pubDate`, else `dc:date` | `dc:date` |
//! | RDF | `dc:date` | none |
//! | Atom | `published`, else `updated` | `updated` |
//!
//! # Entities
//!
//! Many feeds carry HTML entities such as `&rsquo;` or `&nbsp;` that XML does
//! not define. They are decoded before parsing; the five XML entities are left
//! alone and unknown names are escaped so the document stays well-formed.
//!
//! The root element picks the model: `feed` is Atom, anything else is read as
//! RSS. A broken RSS document is a parse error, never an empty Atom feed.

use super::FetchError;
use crate::models::RawRecord;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::borrow::Cow;
use tracing::debug;

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("valid entity regex"));

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: Option<RssChannel>,
    /// RDF feeds put items next to the channel instead of inside it.
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    guid: Option<RssGuid>,
}

#[derive(Debug, Deserialize)]
struct RssGuid {
    #[serde(rename = "@isPermaLink")]
    is_perma_link: Option<String>,
    #[serde(rename = "$text", default)]
    value: String,
}

impl RssGuid {
    /// The guid as a link, if it is flagged (or defaults) as a permalink URL.
    fn permalink(&self) -> Option<&str> {
        let value = self.value.trim();
        let flagged = !matches!(self.is_perma_link.as_deref(), Some("false"));
        (flagged && (value.starts_with("http://") || value.starts_with("https://")))
            .then_some(value)
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl RssDocument {
    fn is_rss(&self) -> bool {
        self.channel.is_some() || !self.items.is_empty()
    }

    fn into_records(self) -> Vec<RawRecord> {
        let channel_items = self.channel.map(|c| c.items).unwrap_or_default();
        channel_items
            .into_iter()
            .chain(self.items)
            .map(RssItem::into_record)
            .filter(|r| !r.is_blank())
            .collect()
    }
}

impl RssItem {
    fn into_record(self) -> RawRecord {
        let (timestamp_raw, timestamp_alt) = match (self.pub_date, self.dc_date) {
            (Some(pub_date), dc_date) => (Some(pub_date), dc_date),
            (None, dc_date) => (dc_date, None),
        };
        let link = self
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .or_else(|| self.guid.as_ref().and_then(RssGuid::permalink))
            .unwrap_or_default()
            .to_string();
        RawRecord {
            title: self.title.unwrap_or_default(),
            summary: self.description.unwrap_or_default(),
            link,
            timestamp_raw,
            timestamp_alt,
        }
    }
}

impl AtomEntry {
    /// `rel="alternate"` (or no `rel`) wins; otherwise the first link with an href.
    fn best_link(&self) -> String {
        self.links
            .iter()
            .find(|l| l.href.is_some() && matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.iter().find(|l| l.href.is_some()))
            .and_then(|l| l.href.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn into_record(self) -> RawRecord {
        let link = self.best_link();
        let (timestamp_raw, timestamp_alt) = match (self.published, self.updated) {
            (Some(published), updated) => (Some(published), updated),
            (None, updated) => (updated, None),
        };
        RawRecord {
            title: self.title.map(|t| t.value).unwrap_or_default(),
            summary: self.summary.map(|t| t.value).unwrap_or_default(),
            link,
            timestamp_raw,
            timestamp_alt,
        }
    }
}

/// Decode HTML-only named entities so the body is well-formed XML.
fn scrub_html_entities(body: &str) -> Cow<'_, str> {
    RE_ENTITY.replace_all(body, |caps: &Captures<'_>| {
        let whole = &caps[0];
        if XML_ENTITIES.contains(&&caps[1]) {
            return whole.to_string();
        }
        let decoded = html_escape::decode_html_entities(whole);
        if decoded == whole {
            format!("&amp;{}", &whole[1..])
        } else {
            html_escape::encode_text(&decoded).into_owned()
        }
    })
}

/// Local name of the document's first element.
fn root_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn parse_error(e: impl ToString) -> FetchError {
    FetchError::Parse(truncate_for_log(&e.to_string(), 200))
}

fn parse_atom(body: &str) -> Result<Vec<RawRecord>, FetchError> {
    let feed = from_str::<AtomFeed>(body).map_err(parse_error)?;
    let records: Vec<RawRecord> = feed
        .entries
        .into_iter()
        .map(AtomEntry::into_record)
        .filter(|r| !r.is_blank())
        .collect();
    debug!(count = records.len(), format = "atom", "Parsed feed");
    Ok(records)
}

fn parse_rss(body: &str) -> Result<Vec<RawRecord>, FetchError> {
    let doc = from_str::<RssDocument>(body).map_err(parse_error)?;
    if !doc.is_rss() {
        return Err(parse_error("neither an RSS channel nor items found"));
    }
    let records = doc.into_records();
    debug!(count = records.len(), format = "rss", "Parsed feed");
    Ok(records)
}

/// Extract records from an RSS or Atom document.
///
/// Entries without a title and without a summary are skipped. A document that
/// is neither RSS nor Atom, or does not parse, is a [`FetchError::Parse`].
pub fn parse_feed(body: &str) -> Result<Vec<RawRecord>, FetchError> {
    let body = scrub_html_entities(body);
    match root_element(&body).as_deref() {
        Some("feed") => parse_atom(&body),
        Some(_) => parse_rss(&body),
        None => Err(parse_error("no root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rss_items() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Hammer &amp; Rails</title>
    <link>https://www.hammerandrails.com</link>
    <item>
      <title>Purdue 87, Northern Kentucky 52</title>
      <link> https://www.hammerandrails.com/recap </link>
      <description><![CDATA[<p>Braden Smith &amp; company roll.</p>]]></description>
      <pubDate>Mon, 04 Nov 2024 19:30:00 GMT</pubDate>
      <guid isPermaLink="false">abc</guid>
    </item>
    <item>
      <title>Painter on the rotation</title>
      <link>https://www.hammerandrails.com/rotation</link>
    </item>
  </channel>
</rss>"#;

        let records = parse_feed(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Purdue 87, Northern Kentucky 52");
        assert_eq!(records[0].link, "https://www.hammerandrails.com/recap");
        assert!(records[0].summary.contains("Braden Smith"));
        assert_eq!(
            records[0].timestamp_raw.as_deref(),
            Some("Mon, 04 Nov 2024 19:30:00 GMT")
        );
        assert_eq!(records[1].timestamp_raw, None);
        assert_eq!(records[1].summary, "");
    }

    #[test]
    fn test_atom_entries_prefer_published() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>GoldandBlack</title>
  <entry>
    <title type="html">Boilers land a commit</title>
    <link rel="self" href="https://example.com/self/1"/>
    <link rel="alternate" href="https://example.com/story/1"/>
    <id>urn:1</id>
    <published>2024-11-01T12:00:00Z</published>
    <updated>2024-11-02T12:00:00Z</updated>
    <summary>Recruiting news</summary>
  </entry>
  <entry>
    <title>Only updated</title>
    <link href="https://example.com/story/2"/>
    <updated>2024-11-03T08:00:00Z</updated>
  </entry>
  <entry>
    <title>No time at all</title>
  </entry>
</feed>"#;

        let records = parse_feed(xml).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title, "Boilers land a commit");
        assert_eq!(records[0].link, "https://example.com/story/1");
        assert_eq!(records[0].summary, "Recruiting news");
        assert_eq!(records[0].timestamp_raw.as_deref(), Some("2024-11-01T12:00:00Z"));
        assert_eq!(records[0].timestamp_alt.as_deref(), Some("2024-11-02T12:00:00Z"));

        assert_eq!(records[1].link, "https://example.com/story/2");
        assert_eq!(records[1].timestamp_raw.as_deref(), Some("2024-11-03T08:00:00Z"));
        assert_eq!(records[1].timestamp_alt, None);

        assert_eq!(records[2].link, "");
        assert_eq!(records[2].timestamp_raw, None);
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let xml = r#"<rss version="2.0"><channel>
<item><title></title><link>https://example.com/empty</link></item>
<item><title>Kept</title></item>
</channel></rss>"#;
        let records = parse_feed(xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Kept");
    }

    #[test]
    fn test_empty_channel_is_not_an_error() {
        let xml = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_html_entities_do_not_sink_the_feed() {
        let xml = r#"<rss version="2.0"><channel>
<item><title>Purdue&rsquo;s big win&nbsp;tonight</title><link>https://example.com/1</link>
<description>Smith &amp; Loyer &mdash; 40 points &lt;combined&gt; &bogus;</description></item>
<item><title>Second story</title><link>https://example.com/2</link></item>
</channel></rss>"#;
        let records = parse_feed(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Purdue\u{2019}s big win\u{a0}tonight");
        assert_eq!(
            records[0].summary,
            "Smith & Loyer \u{2014} 40 points <combined> &bogus;"
        );
        assert_eq!(records[1].title, "Second story");
    }

    #[test]
    fn test_broken_rss_is_not_read_as_atom() {
        let xml = r#"<rss version="2.0"><channel>
<item><title>Fine</title></item>
<item><title>Unclosed</item>
</channel></rss>"#;
        assert!(matches!(parse_feed(xml), Err(FetchError::Parse(_))));

        let not_a_feed = "<html><body><p>Maintenance</p></body></html>";
        assert!(matches!(parse_feed(not_a_feed), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_permalink_guid_fills_missing_link() {
        let xml = r#"<rss version="2.0"><channel>
<item><title>Guid only</title><guid isPermaLink="true">https://example.com/g1</guid></item>
<item><title>Default permalink</title><guid> https://example.com/g2 </guid></item>
<item><title>Opaque guid</title><guid isPermaLink="false">https://example.com/g3</guid></item>
<item><title>Both</title><link>https://example.com/link</link><guid>https://example.com/g4</guid></item>
</channel></rss>"#;
        let records = parse_feed(xml).unwrap();
        let links: Vec<_> = records.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/g1",
                "https://example.com/g2",
                "",
                "https://example.com/link",
            ]
        );
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = parse_feed("<rss><channel><item><title>cut off").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
