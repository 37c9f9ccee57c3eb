// src/presets/generic.rs
//! Any feed → one Discord-style text message per item.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{truncate_chars, with_destinations};
use crate::feed::{Destination, FeedConfig, RenderFn};
use crate::ingest::RawItem;

/// Discord rejects `content` above 2000 characters.
const MAX_CONTENT_CHARS: usize = 2000;
const MAX_SUMMARY_CHARS: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
}

pub fn normalize(item: &RawItem) -> Option<Article> {
    Some(Article {
        title: item
            .title
            .clone()
            .unwrap_or_else(|| "(untitled)".to_string()),
        link: item.link.clone(),
        summary: item
            .content_snippet
            .clone()
            .filter(|s| !s.trim().is_empty()),
    })
}

pub fn render(article: &Article) -> Option<Value> {
    let mut content = format!("**{}**", article.title);
    if let Some(summary) = &article.summary {
        content.push_str("\n\n");
        content.push_str(&truncate_chars(summary, MAX_SUMMARY_CHARS));
    }
    if let Some(link) = &article.link {
        content.push_str("\n\n");
        content.push_str(link);
    }
    Some(json!({ "content": truncate_chars(&content, MAX_CONTENT_CHARS) }))
}

pub fn feed(id: &str, source: &str, destinations: &[Destination]) -> FeedConfig<Article> {
    let render: RenderFn<Article> = Arc::new(render);
    with_destinations(FeedConfig::new(id, source, normalize), destinations, render)
}
