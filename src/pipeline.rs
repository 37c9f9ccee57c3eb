// src/pipeline.rs
//! # Poll cycle
//! One feed, one cycle:
//!
//! ```text
//! Fetching → DetectingNovelty → Idle
//!                             → Rendering → Dispatching → AdvancingWatermark
//! ```
//!
//! Fetch and watermark-read failures end the cycle without writing anything.
//! Once dispatch has started, the watermark advances no matter how the
//! individual deliveries went: re-delivery is worse than a lost notification.

use async_trait::async_trait;
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::error::{FetchError, StorageError};
use crate::feed::FeedConfig;
use crate::ingest::{FeedFetcher, RawItem};
use crate::notify::{DeliveryResult, Dispatcher, Payload};
use crate::novelty::{matches_watermark, newest, select_new};
use crate::watermark::WatermarkStore;

/// Collaborators shared by every feed.
#[derive(Clone)]
pub struct PollContext {
    pub fetcher: Arc<dyn FeedFetcher>,
    pub store: Arc<dyn WatermarkStore>,
    pub dispatcher: Dispatcher,
    pub fetch_timeout: Duration,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// A cycle for this feed was already running; nothing was done.
    Busy,
    FetchFailed(FetchError),
    /// The feed answered with zero items.
    Empty,
    StorageFailed(StorageError),
    /// First cycle for the feed: nothing delivered, watermark set to the tip.
    /// `None` when the tip had no usable id.
    Baseline { watermark: Option<String> },
    /// Nothing newer than the watermark.
    Idle,
    Delivered {
        /// Unique ids of the new items, oldest first.
        items: Vec<String>,
        results: Vec<DeliveryResult>,
        /// What was written, `None` if the write failed or the newest item had no id.
        watermark: Option<String>,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Busy => "busy",
            CycleOutcome::FetchFailed(_) => "fetch_failed",
            CycleOutcome::Empty => "empty",
            CycleOutcome::StorageFailed(_) => "storage_failed",
            CycleOutcome::Baseline { .. } => "baseline",
            CycleOutcome::Idle => "idle",
            CycleOutcome::Delivered { .. } => "delivered",
        }
    }
}

#[async_trait]
pub trait PollJob: Send + Sync {
    fn feed_id(&self) -> &str;
    fn interval(&self) -> Duration;
    /// Run one complete cycle. Never panics on collaborator errors and never
    /// overlaps with itself.
    async fn poll(&self) -> CycleOutcome;
}

pub struct FeedPoller<T> {
    feed: FeedConfig<T>,
    ctx: PollContext,
    in_progress: AtomicBool,
}

impl<T: Send + Sync + 'static> FeedPoller<T> {
    pub fn new(feed: FeedConfig<T>, ctx: PollContext) -> Self {
        crate::metrics::ensure_metrics_described();
        Self {
            feed,
            ctx,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn feed(&self) -> &FeedConfig<T> {
        &self.feed
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let feed_id = self.feed.id.as_str();

        // Fetching
        let fetched = match tokio::time::timeout(
            self.ctx.fetch_timeout,
            self.ctx.fetcher.fetch(&self.feed.source),
        )
        .await
        {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => return self.fetch_failed(e),
            Err(_) => {
                return self.fetch_failed(FetchError::Timeout {
                    url: self.feed.source.clone(),
                    secs: self.ctx.fetch_timeout.as_secs(),
                })
            }
        };

        if fetched.is_empty() {
            tracing::debug!("feed returned no items");
            return CycleOutcome::Empty;
        }

        // DetectingNovelty
        let watermark = match self.ctx.store.get(feed_id).await {
            Ok(Some(w)) => w,
            Ok(None) => return self.establish_baseline(&fetched).await,
            Err(e) => {
                tracing::error!(error = %e, "cannot read watermark, skipping cycle");
                return CycleOutcome::StorageFailed(e);
            }
        };

        let new_items = match &self.feed.is_delivered {
            Some(check) => select_new(fetched, |it| check(it, &watermark)),
            None => select_new(fetched, matches_watermark(&watermark.last_delivered_id)),
        };

        if new_items.is_empty() {
            tracing::debug!(watermark = %watermark.last_delivered_id, "latest item already processed");
            return CycleOutcome::Idle;
        }

        tracing::info!(count = new_items.len(), "processing new items");
        counter!("feed_new_items_total", "feed" => self.feed.id.clone())
            .increment(new_items.len() as u64);

        // Rendering
        let payloads = render_payloads(&self.feed, &new_items);

        // Dispatching
        let results = self.ctx.dispatcher.dispatch(payloads).await;
        let failed = results.iter().filter(|r| !r.ok).count();
        if failed > 0 {
            tracing::warn!(failed, total = results.len(), "some deliveries failed");
        }

        // AdvancingWatermark
        let newest_id = new_items.last().and_then(|it| it.unique_id.clone());
        let watermark = match newest_id {
            Some(id) => self.write_watermark(&id).await.then_some(id),
            None => {
                tracing::warn!("newest item has no unique id, watermark not advanced");
                None
            }
        };

        CycleOutcome::Delivered {
            items: new_items
                .iter()
                .map(|it| it.unique_id.clone().unwrap_or_default())
                .collect(),
            results,
            watermark,
        }
    }

    async fn establish_baseline(&self, items: &[RawItem]) -> CycleOutcome {
        let Some(tip_id) = newest(items).and_then(|it| it.unique_id.clone()) else {
            tracing::warn!("no watermark yet and the newest item has no id; nothing recorded");
            return CycleOutcome::Baseline { watermark: None };
        };

        match self.ctx.store.set(&self.feed.id, &tip_id).await {
            Ok(()) => {
                tracing::info!(watermark = %tip_id, "first run, baseline recorded without delivering");
                counter!("watermark_writes_total", "feed" => self.feed.id.clone()).increment(1);
                CycleOutcome::Baseline {
                    watermark: Some(tip_id),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot record baseline watermark");
                CycleOutcome::StorageFailed(e)
            }
        }
    }

    async fn write_watermark(&self, id: &str) -> bool {
        match self.ctx.store.set(&self.feed.id, id).await {
            Ok(()) => {
                counter!("watermark_writes_total", "feed" => self.feed.id.clone()).increment(1);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, watermark = %id, "cannot advance watermark");
                false
            }
        }
    }

    fn fetch_failed(&self, e: FetchError) -> CycleOutcome {
        tracing::warn!(error = %e, "fetch failed, will retry on next trigger");
        counter!("feed_fetch_errors_total", "feed" => self.feed.id.clone()).increment(1);
        CycleOutcome::FetchFailed(e)
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> PollJob for FeedPoller<T> {
    fn feed_id(&self) -> &str {
        &self.feed.id
    }

    fn interval(&self) -> Duration {
        self.feed.interval
    }

    async fn poll(&self) -> CycleOutcome {
        let Some(_guard) = InProgress::acquire(&self.in_progress) else {
            tracing::debug!(feed = %self.feed.id, "previous cycle still running, skipping");
            return CycleOutcome::Busy;
        };

        let span = tracing::info_span!("poll_cycle", feed = %self.feed.id);
        let outcome = self.run_cycle().instrument(span).await;

        counter!("feed_cycles_total", "feed" => self.feed.id.clone(), "outcome" => outcome.label())
            .increment(1);
        outcome
    }
}

/// Normalize each item, then render it for every destination. Items the
/// normalizer drops and destinations whose renderer declines are skipped.
/// Output keeps item order.
pub fn render_payloads<T>(feed: &FeedConfig<T>, items: &[RawItem]) -> Vec<Payload> {
    let mut out = Vec::new();
    for item in items {
        let Some(record) = (feed.normalize)(item) else {
            tracing::debug!(item = ?item.unique_id, "item filtered by normalizer");
            continue;
        };
        for hook in &feed.webhooks {
            match (hook.render)(&record) {
                Some(body) => out.push(Payload {
                    destination: hook.destination.clone(),
                    body,
                }),
                None => tracing::debug!(
                    item = ?item.unique_id,
                    destination = %hook.destination.name,
                    "no payload for destination"
                ),
            }
        }
    }
    out
}

/// Clears the flag on drop, also when the cycle future is cancelled.
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
