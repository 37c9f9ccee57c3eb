// src/presets/dennikn.rs
//! Denník N articles → Discord forum-channel threads.
//!
//! Each article opens a thread named after its title, tagged with the forum
//! tags matching its categories, and pings the news role.

use serde_json::{json, Value};
use std::sync::Arc;

use super::{fold_key, truncate_chars, with_destinations};
use crate::feed::{Destination, FeedConfig, RenderFn};
use crate::ingest::RawItem;

/// Discord caps thread names at 100 characters.
const MAX_THREAD_NAME_CHARS: usize = 100;

const NEWS_ROLE_ID: &str = "1437881478506610828";

/// Folded category name → forum tag id.
const CATEGORY_TAGS: &[(&str, &str)] = &[
    ("komentare", "1437883640921985035"),
    ("ficova vlada", "1437883657263124572"),
    ("robert fico", "1437883671548792873"),
    ("sudna rada", "1437883697834627102"),
    ("ustavny sud", "1437883714918154360"),
    ("skolstvo", "1437883729472131174"),
    ("vojna na ukrajine", "1437883744273961142"),
    ("rusko", "1437883756018012171"),
    ("vladimir putin", "1437883768638669000"),
    ("mladi", "1437883782257578185"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub link: String,
    pub categories: Vec<String>,
}

pub fn normalize(item: &RawItem) -> Option<Article> {
    Some(Article {
        title: item.title.clone().unwrap_or_default(),
        description: item.content_snippet.clone().unwrap_or_default(),
        link: item.link.clone().unwrap_or_default(),
        categories: item.categories.clone(),
    })
}

/// Forum tag ids for the article's categories, in category order.
pub fn tags_for(categories: &[String]) -> Vec<&'static str> {
    categories
        .iter()
        .filter_map(|c| {
            let key = fold_key(c);
            CATEGORY_TAGS
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, tag)| *tag)
        })
        .collect()
}

pub fn render(article: &Article) -> Option<Value> {
    Some(json!({
        "thread_name": truncate_chars(&article.title, MAX_THREAD_NAME_CHARS),
        "content": format!(
            "## {}\n\n{}\n\n{} <@&{NEWS_ROLE_ID}>",
            article.title, article.description, article.link
        ),
        "applied_tags": tags_for(&article.categories),
        "allowed_mentions": { "roles": [NEWS_ROLE_ID] },
    }))
}

pub fn feed(id: &str, source: &str, destinations: &[Destination]) -> FeedConfig<Article> {
    let render: RenderFn<Article> = Arc::new(render);
    with_destinations(FeedConfig::new(id, source, normalize), destinations, render)
}
