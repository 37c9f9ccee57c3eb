// src/ingest/mod.rs
pub mod fetcher;
pub mod parser;
pub mod scheduler;
pub mod types;

pub use fetcher::HttpFeedFetcher;
pub use parser::parse_feed;
pub use types::{FeedFetcher, RawItem};

use once_cell::sync::OnceCell;
use regex::Regex;

/// Plain-text snippet of an HTML fragment, the way feed readers show it:
/// line breaks and paragraph ends become newlines, tags are dropped,
/// entities decoded, surrounding whitespace trimmed.
pub fn content_snippet(html: &str) -> String {
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_BLANK_RUNS: OnceCell<Regex> = OnceCell::new();

    let re_breaks =
        RE_BREAKS.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>").expect("valid regex"));
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));
    let re_blank_runs =
        RE_BLANK_RUNS.get_or_init(|| Regex::new(r"\n[ \t]*\n[\s]*").expect("valid regex"));

    // 1) Breaks to newlines, before tags disappear
    let out = re_breaks.replace_all(html, "\n");

    // 2) Strip remaining tags
    let out = re_tags.replace_all(&out, "");

    // 3) Entities last, so an escaped `&lt;b&gt;` stays visible text
    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    // 4) At most one blank line in a row
    let out = re_blank_runs.replace_all(&out, "\n\n");

    out.trim().to_string()
}

/// Rewrite HTML-only named entities (`&eacute;`, `&nbsp;`, ...) as numeric
/// references, which XML parsers accept. The five XML entities are left
/// alone; names HTML does not know either are escaped into literal text.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re_entity =
        RE_ENTITY.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("valid regex"));

    re_entity
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            if matches!(&caps[1], "amp" | "lt" | "gt" | "quot" | "apos") {
                return whole.to_string();
            }
            let decoded = html_escape::decode_html_entities(whole);
            if decoded == whole {
                return format!("&amp;{}", &whole[1..]);
            }
            decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
        })
        .into_owned()
}
