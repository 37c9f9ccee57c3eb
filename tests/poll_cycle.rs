// tests/poll_cycle.rs
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feed_relay::error::{DeliveryError, FetchError, StorageError};
use feed_relay::ingest::FeedFetcher;
use feed_relay::notify::WebhookSender;
use feed_relay::watermark::MemoryStore;
use feed_relay::{
    CycleOutcome, Dispatcher, FeedConfig, FeedPoller, PollContext, PollJob, RawItem, Watermark,
    WatermarkStore,
};

// --- mocks ---

enum Mode {
    Items(Vec<RawItem>),
    Fail,
    Hang,
}

struct MockFetcher {
    mode: Mode,
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<RawItem>, FetchError> {
        match &self.mode {
            Mode::Items(items) => Ok(items.clone()),
            Mode::Fail => Err(FetchError::Status {
                url: source.to_string(),
                status: 503,
            }),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Default)]
struct RecordingSender {
    calls: Mutex<Vec<(String, Value)>>,
    broken: HashSet<String>,
}

impl RecordingSender {
    fn failing(urls: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            broken: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send(&self, url: &str, body: &Value) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        if self.broken.contains(url) {
            return Err(DeliveryError::Status(500));
        }
        Ok(())
    }
}

struct BrokenStore;

#[async_trait]
impl WatermarkStore for BrokenStore {
    async fn get(&self, _feed_id: &str) -> Result<Option<Watermark>, StorageError> {
        Err(StorageError::Io {
            path: PathBuf::from("data/sent-items.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        })
    }

    async fn set(&self, _feed_id: &str, _id: &str) -> Result<(), StorageError> {
        panic!("must not write after a failed read");
    }
}

/// Reads fine, refuses every write.
struct ReadOnlyStore {
    last: &'static str,
}

#[async_trait]
impl WatermarkStore for ReadOnlyStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Watermark>, StorageError> {
        Ok(Some(Watermark {
            feed_id: feed_id.to_string(),
            last_delivered_id: self.last.to_string(),
        }))
    }

    async fn set(&self, _feed_id: &str, _id: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            path: PathBuf::from("data/sent-items.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }
}

// --- helpers ---

fn item(id: &str, t: i64) -> RawItem {
    RawItem {
        unique_id: Some(id.to_string()),
        published_at: Some(Utc.timestamp_opt(t, 0).unwrap()),
        title: Some(format!("Title {id}")),
        link: Some(format!("https://example.com/{id}")),
        ..Default::default()
    }
}

fn ctx(
    mode: Mode,
    store: Arc<dyn WatermarkStore>,
    sender: Arc<RecordingSender>,
) -> PollContext {
    PollContext {
        fetcher: Arc::new(MockFetcher { mode }),
        store,
        dispatcher: Dispatcher::new(sender),
        fetch_timeout: Duration::from_secs(5),
    }
}

fn echo_feed() -> FeedConfig<RawItem> {
    FeedConfig::new("F", "mem://F", |it: &RawItem| Some(it.clone()))
        .webhook("a", "http://a", |it: &RawItem| Some(json!({ "id": it.unique_id })))
}

fn body_ids(calls: &[(String, Value)], url: &str) -> Vec<String> {
    calls
        .iter()
        .filter(|(u, _)| u == url)
        .map(|(_, b)| b["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

// --- scenarios ---

#[tokio::test]
async fn unordered_batch_delivers_gap_and_advances_watermark() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-3"));
    let sender = Arc::new(RecordingSender::default());
    let batch = vec![item("item-5", 5), item("item-3", 3), item("item-4", 4)];
    let poller = FeedPoller::new(echo_feed(), ctx(Mode::Items(batch), store.clone(), sender.clone()));

    match poller.poll().await {
        CycleOutcome::Delivered {
            items,
            results,
            watermark,
        } => {
            assert_eq!(items, vec!["item-4".to_string(), "item-5".to_string()]);
            assert_eq!(results.len(), 2);
            assert!(results.iter().all(|r| r.ok));
            assert_eq!(watermark.as_deref(), Some("item-5"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(body_ids(&sender.calls(), "http://a"), vec!["item-4", "item-5"]);
    assert_eq!(store.writes(), vec![("F".to_string(), "item-5".to_string())]);
}

#[tokio::test]
async fn stale_tip_is_idle_and_writes_nothing() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-9"));
    let sender = Arc::new(RecordingSender::default());
    let batch = vec![item("item-9", 9), item("item-7", 7), item("item-8", 8)];
    let poller = FeedPoller::new(echo_feed(), ctx(Mode::Items(batch), store.clone(), sender.clone()));

    assert!(matches!(poller.poll().await, CycleOutcome::Idle));
    assert!(sender.calls().is_empty());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn failing_destination_is_isolated_and_watermark_still_advances() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::failing(&["http://broken"]));
    let feed = echo_feed().webhook("broken", "http://broken", |it: &RawItem| {
        Some(json!({ "id": it.unique_id }))
    });
    let poller = FeedPoller::new(
        feed,
        ctx(Mode::Items(vec![item("item-1", 1), item("item-2", 2)]), store.clone(), sender.clone()),
    );

    let CycleOutcome::Delivered {
        results, watermark, ..
    } = poller.poll().await
    else {
        panic!("expected a delivery");
    };

    assert_eq!(results.len(), 2);
    let ok: Vec<_> = results.iter().filter(|r| r.ok).collect();
    let failed: Vec<_> = results.iter().filter(|r| !r.ok).collect();
    assert_eq!(ok.len(), 1);
    assert_eq!(ok[0].destination.name, "a");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].destination.name, "broken");
    assert_eq!(failed[0].error, Some(DeliveryError::Status(500)));

    assert_eq!(watermark.as_deref(), Some("item-2"));
    assert_eq!(store.writes(), vec![("F".to_string(), "item-2".to_string())]);
}

#[tokio::test]
async fn declined_render_means_no_attempt_for_that_destination() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::default());
    let feed = echo_feed().webhook("tags", "http://tags", |_it: &RawItem| None);
    let poller = FeedPoller::new(
        feed,
        ctx(Mode::Items(vec![item("item-1", 1), item("item-2", 2)]), store, sender.clone()),
    );

    let CycleOutcome::Delivered { results, .. } = poller.poll().await else {
        panic!("expected a delivery");
    };
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].destination.url, "http://a");
    assert!(sender.calls().iter().all(|(url, _)| url != "http://tags"));
}

#[tokio::test]
async fn normalizer_filter_still_advances_to_newest() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::default());
    let feed = FeedConfig::new("F", "mem://F", |it: &RawItem| {
        (it.unique_id.as_deref() != Some("item-3")).then(|| it.clone())
    })
    .webhook("a", "http://a", |it: &RawItem| Some(json!({ "id": it.unique_id })));
    let batch = vec![item("item-1", 1), item("item-2", 2), item("item-3", 3)];
    let poller = FeedPoller::new(feed, ctx(Mode::Items(batch), store.clone(), sender.clone()));

    let CycleOutcome::Delivered { watermark, .. } = poller.poll().await else {
        panic!("expected a delivery");
    };
    assert_eq!(body_ids(&sender.calls(), "http://a"), vec!["item-2"]);
    assert_eq!(watermark.as_deref(), Some("item-3"));
}

#[tokio::test]
async fn fetch_failure_never_writes_watermark() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::default());
    let poller = FeedPoller::new(echo_feed(), ctx(Mode::Fail, store.clone(), sender.clone()));

    assert!(matches!(
        poller.poll().await,
        CycleOutcome::FetchFailed(FetchError::Status { status: 503, .. })
    ));
    assert!(store.writes().is_empty());
    assert!(sender.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hanging_fetch_times_out() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::default());
    let mut context = ctx(Mode::Hang, store.clone(), sender);
    context.fetch_timeout = Duration::from_millis(50);
    let poller = FeedPoller::new(echo_feed(), context);

    assert!(matches!(
        poller.poll().await,
        CycleOutcome::FetchFailed(FetchError::Timeout { .. })
    ));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn empty_feed_ends_cycle_quietly() {
    let store = Arc::new(MemoryStore::with_entry("F", "item-1"));
    let sender = Arc::new(RecordingSender::default());
    let poller = FeedPoller::new(echo_feed(), ctx(Mode::Items(vec![]), store.clone(), sender));

    assert!(matches!(poller.poll().await, CycleOutcome::Empty));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn first_run_records_baseline_without_delivering() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    let batch = vec![item("item-2", 2), item("item-3", 3), item("item-1", 1)];
    let poller = FeedPoller::new(echo_feed(), ctx(Mode::Items(batch.clone()), store.clone(), sender.clone()));

    match poller.poll().await {
        CycleOutcome::Baseline { watermark } => assert_eq!(watermark.as_deref(), Some("item-3")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(sender.calls().is_empty());
    assert_eq!(store.writes(), vec![("F".to_string(), "item-3".to_string())]);

    // Same batch again: nothing new.
    assert!(matches!(poller.poll().await, CycleOutcome::Idle));
}

#[tokio::test]
async fn unreadable_watermark_aborts_instead_of_redelivering_history() {
    let sender = Arc::new(RecordingSender::default());
    let poller = FeedPoller::new(
        echo_feed(),
        ctx(Mode::Items(vec![item("item-1", 1)]), Arc::new(BrokenStore), sender.clone()),
    );

    assert!(matches!(poller.poll().await, CycleOutcome::StorageFailed(_)));
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn failed_watermark_write_still_reports_deliveries() {
    let sender = Arc::new(RecordingSender::default());
    let batch = vec![item("item-1", 1), item("item-2", 2), item("item-3", 3)];
    let poller = FeedPoller::new(
        echo_feed(),
        ctx(Mode::Items(batch), Arc::new(ReadOnlyStore { last: "item-1" }), sender.clone()),
    );

    match poller.poll().await {
        CycleOutcome::Delivered {
            items,
            results,
            watermark,
        } => {
            assert_eq!(items, vec!["item-2".to_string(), "item-3".to_string()]);
            assert_eq!(results.len(), 2);
            assert!(results.iter().all(|r| r.ok));
            assert_eq!(watermark, None);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(body_ids(&sender.calls(), "http://a"), vec!["item-2", "item-3"]);

    // the flag is released and the next cycle runs normally
    assert!(matches!(poller.poll().await, CycleOutcome::Delivered { .. }));
}

#[tokio::test]
async fn override_predicate_replaces_id_comparison() {
    // Watermark stores the link instead of the id.
    let store = Arc::new(MemoryStore::with_entry("F", "https://example.com/item-2"));
    let sender = Arc::new(RecordingSender::default());
    let feed = echo_feed().delivered_when(|it, w| it.link.as_deref() == Some(w.last_delivered_id.as_str()));
    let batch = vec![item("item-1", 1), item("item-2", 2), item("item-3", 3)];
    let poller = FeedPoller::new(feed, ctx(Mode::Items(batch), store, sender.clone()));

    let CycleOutcome::Delivered { items, .. } = poller.poll().await else {
        panic!("expected a delivery");
    };
    assert_eq!(items, vec!["item-3".to_string()]);
}

struct GatedFetcher {
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait]
impl FeedFetcher for GatedFetcher {
    async fn fetch(&self, _source: &str) -> Result<Vec<RawItem>, FetchError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn same_feed_cycles_do_not_overlap() {
    let fetcher = Arc::new(GatedFetcher {
        entered: tokio::sync::Notify::new(),
        release: tokio::sync::Notify::new(),
    });
    let context = PollContext {
        fetcher: fetcher.clone(),
        store: Arc::new(MemoryStore::new()),
        dispatcher: Dispatcher::new(Arc::new(RecordingSender::default())),
        fetch_timeout: Duration::from_secs(5),
    };
    let job: Arc<dyn PollJob> = Arc::new(FeedPoller::new(echo_feed(), context));

    let first = {
        let job = Arc::clone(&job);
        tokio::spawn(async move { job.poll().await })
    };
    fetcher.entered.notified().await;

    assert!(matches!(job.poll().await, CycleOutcome::Busy));

    fetcher.release.notify_one();
    assert!(matches!(first.await.unwrap(), CycleOutcome::Empty));

    // Flag released: the next cycle runs again.
    fetcher.release.notify_one();
    assert!(matches!(job.poll().await, CycleOutcome::Empty));
}
