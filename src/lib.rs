// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod pipeline;
pub mod presets;
pub mod telemetry;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::feed::{Destination, FeedConfig};
pub use crate::ingest::RawItem;
pub use crate::notify::{DeliveryResult, Dispatcher, Payload};
pub use crate::novelty::select_new;
pub use crate::pipeline::{CycleOutcome, FeedPoller, PollContext, PollJob};
pub use crate::watermark::{Watermark, WatermarkStore};

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::HttpFeedFetcher;
use crate::notify::ReqwestWebhook;
use crate::watermark::JsonFileStore;

/// Wire the HTTP fetcher, webhook sender and JSON state file from config.
pub fn build_context(cfg: &AppConfig) -> anyhow::Result<PollContext> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.http.user_agent.clone())
        .build()
        .context("building HTTP client")?;

    let fetcher = HttpFeedFetcher::new(client.clone()).with_timeout(cfg.http.fetch_timeout_secs);
    let sender = ReqwestWebhook::new(client).with_timeout(cfg.http.delivery_timeout_secs);
    let dispatcher = Dispatcher::new(Arc::new(sender))
        .with_timeout(Duration::from_secs(cfg.http.delivery_timeout_secs))
        .with_attempts(cfg.http.delivery_attempts);

    Ok(PollContext {
        fetcher: Arc::new(fetcher),
        store: Arc::new(JsonFileStore::new(cfg.state_path.clone())),
        dispatcher,
        // fetch + parse, a little past the request timeout
        fetch_timeout: Duration::from_secs(cfg.http.fetch_timeout_secs + 5),
    })
}

/// One poll job per configured feed, all sharing `ctx`.
pub fn build_jobs(cfg: &AppConfig, ctx: &PollContext) -> Vec<Arc<dyn PollJob>> {
    cfg.feeds
        .iter()
        .map(|entry| presets::build_job(entry, ctx.clone()))
        .collect()
}
