// src/feed.rs
//! Static per-feed configuration.
//!
//! Each feed carries its own projection (`normalize`) and one renderer per
//! destination, as function values rather than subtypes. `T` is the feed's
//! normalized record; it never leaves the process and is never persisted.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::RawItem;
use crate::watermark::Watermark;

/// RawItem → feed-specific record. `None` drops the item for every destination.
pub type NormalizeFn<T> = Arc<dyn Fn(&RawItem) -> Option<T> + Send + Sync>;

/// Record → JSON body for one destination. `None` means "nothing to send here".
/// Must be pure: no network, no storage.
pub type RenderFn<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;

/// Replacement for the default `unique_id == last_delivered_id` check.
pub type DeliveredFn = Arc<dyn Fn(&RawItem, &Watermark) -> bool + Send + Sync>;

/// Where a payload goes. `name` is only used in logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub name: String,
    pub url: String,
}

pub struct WebhookConfig<T> {
    pub destination: Destination,
    pub render: RenderFn<T>,
}

impl<T> Clone for WebhookConfig<T> {
    fn clone(&self) -> Self {
        Self {
            destination: self.destination.clone(),
            render: Arc::clone(&self.render),
        }
    }
}

pub struct FeedConfig<T> {
    pub id: String,
    /// Feed URL (or any locator the configured fetcher understands).
    pub source: String,
    pub interval: Duration,
    pub webhooks: Vec<WebhookConfig<T>>,
    pub normalize: NormalizeFn<T>,
    pub is_delivered: Option<DeliveredFn>,
}

impl<T> FeedConfig<T> {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        normalize: impl Fn(&RawItem) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            interval: Duration::from_secs(60),
            webhooks: Vec::new(),
            normalize: Arc::new(normalize),
            is_delivered: None,
        }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn webhook(
        mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        render: impl Fn(&T) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.webhooks.push(WebhookConfig {
            destination: Destination {
                name: name.into(),
                url: url.into(),
            },
            render: Arc::new(render),
        });
        self
    }

    pub fn delivered_when(
        mut self,
        check: impl Fn(&RawItem, &Watermark) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_delivered = Some(Arc::new(check));
        self
    }
}
