// src/ingest/parser.rs
//! RSS 2.0 / Atom 1.0 → [`RawItem`].
//!
//! Pure (no I/O) so tests can feed XML strings directly. The root element
//! decides the format; anything that is neither `<rss>` nor `<feed>` is a
//! parse error rather than an empty feed.

use chrono::{DateTime, Utc};
use quick_xml::{de::from_str, events::Event, Reader};
use serde::Deserialize;

use super::types::RawItem;
use super::{content_snippet, scrub_html_entities_for_xml};

/// Element text, tolerant of attributes (`<guid isPermaLink="false">`,
/// `<title type="html">`) and empty elements.
#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

impl Text {
    fn into_opt(self) -> Option<String> {
        let v = self.value.trim();
        (!v.is_empty()).then(|| v.to_string())
    }
}

fn text_opt(t: Option<Text>) -> Option<String> {
    t.and_then(Text::into_opt)
}

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<Text>,
    link: Option<Text>,
    description: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<Text>,
    guid: Option<Text>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
}

// --- Atom 1.0 ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<Text>,
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<Text>,
    content: Option<Text>,
    published: Option<Text>,
    updated: Option<Text>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term", default)]
    term: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Atom,
}

/// Parse a feed document. The error string is a human-readable reason;
/// callers wrap it into [`crate::error::FetchError::Parse`].
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>, String> {
    let xml = scrub_html_entities_for_xml(xml);
    match sniff_root(&xml)? {
        FeedKind::Rss => {
            let rss: Rss = from_str(&xml).map_err(|e| format!("rss: {e}"))?;
            Ok(rss.channel.items.into_iter().map(from_rss).collect())
        }
        FeedKind::Atom => {
            let feed: AtomFeed = from_str(&xml).map_err(|e| format!("atom: {e}"))?;
            Ok(feed.entries.into_iter().map(from_atom).collect())
        }
    }
}

fn sniff_root(xml: &str) -> Result<FeedKind, String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return match e.local_name().as_ref() {
                    b"rss" => Ok(FeedKind::Rss),
                    b"feed" => Ok(FeedKind::Atom),
                    other => Err(format!(
                        "unsupported root element <{}>",
                        String::from_utf8_lossy(other)
                    )),
                };
            }
            Ok(Event::Eof) => return Err("document has no root element".to_string()),
            Ok(_) => continue,
            Err(e) => return Err(format!("malformed xml: {e}")),
        }
    }
}

fn from_rss(it: RssItem) -> RawItem {
    let link = text_opt(it.link);
    let description = text_opt(it.description);
    RawItem {
        unique_id: text_opt(it.guid).or_else(|| link.clone()),
        published_at: text_opt(it.pub_date).as_deref().and_then(parse_timestamp),
        title: text_opt(it.title).map(plain_spaces),
        content_snippet: description.as_deref().map(content_snippet),
        description,
        link,
        categories: it.categories.into_iter().filter_map(Text::into_opt).collect(),
    }
}

fn from_atom(e: AtomEntry) -> RawItem {
    let link = pick_atom_link(&e.links);
    let description = text_opt(e.summary).or_else(|| text_opt(e.content));
    let published = text_opt(e.published).or_else(|| text_opt(e.updated));
    RawItem {
        unique_id: text_opt(e.id).or_else(|| link.clone()),
        published_at: published.as_deref().and_then(parse_timestamp),
        title: text_opt(e.title).map(plain_spaces),
        content_snippet: description.as_deref().map(content_snippet),
        description,
        link,
        categories: e
            .categories
            .into_iter()
            .map(|c| c.term.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    }
}

/// Titles end up in thread names and headings; no-break spaces from
/// `&nbsp;` become ordinary ones.
fn plain_spaces(s: String) -> String {
    if s.contains('\u{00A0}') {
        s.replace('\u{00A0}', " ")
    } else {
        s
    }
}

fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// RFC 2822 (RSS) first, then RFC 3339 (Atom). `None` when neither parses.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
