// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// One entry as it came out of a feed, before any per-feed projection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawItem {
    /// `<guid>` / `<id>`, falling back to the item link.
    pub unique_id: Option<String>,
    /// `None` when the feed omitted the date or it did not parse.
    pub published_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub link: Option<String>,
    /// Raw description/summary, possibly HTML.
    pub description: Option<String>,
    /// Plain-text rendition of `description` (tags stripped, entities decoded).
    pub content_snippet: Option<String>,
    pub categories: Vec<String>,
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `source`. Zero items is `Ok(vec![])`.
    async fn fetch(&self, source: &str) -> Result<Vec<RawItem>, FetchError>;
}
