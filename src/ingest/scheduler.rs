// src/ingest/scheduler.rs
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::{CycleOutcome, PollJob};

/// One timer per feed. The first tick fires immediately.
///
/// A tick awaits its cycle before the next one is taken and late ticks are
/// skipped, so cycles of the same feed never overlap. Each cycle runs as its
/// own task: a panic inside one (e.g. in a renderer) is logged and the
/// feed's timer keeps going.
pub fn spawn_schedulers(jobs: Vec<Arc<dyn PollJob>>) -> Vec<JoinHandle<()>> {
    jobs.into_iter().map(spawn_scheduler).collect()
}

pub fn spawn_scheduler(job: Arc<dyn PollJob>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(job.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            feed = job.feed_id(),
            interval_secs = job.interval().as_secs(),
            "feed scheduled"
        );

        loop {
            ticker.tick().await;

            let cycle = Arc::clone(&job);
            match tokio::spawn(async move { cycle.poll().await }).await {
                Ok(outcome) => log_outcome(job.feed_id(), &outcome),
                Err(e) => {
                    tracing::error!(feed = job.feed_id(), error = %e, "poll cycle aborted")
                }
            }
        }
    })
}

/// Run every job once, concurrently, and return `(feed_id, outcome)` pairs.
pub async fn run_all_once(jobs: &[Arc<dyn PollJob>]) -> Vec<(String, CycleOutcome)> {
    let cycles = jobs.iter().map(|job| async move {
        let outcome = job.poll().await;
        log_outcome(job.feed_id(), &outcome);
        (job.feed_id().to_string(), outcome)
    });
    futures::future::join_all(cycles).await
}

fn log_outcome(feed: &str, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Delivered {
            items,
            results,
            watermark,
        } => tracing::info!(
            feed,
            items = items.len(),
            deliveries = results.len(),
            failed = results.iter().filter(|r| !r.ok).count(),
            watermark = watermark.as_deref().unwrap_or("-"),
            "cycle done"
        ),
        other => tracing::debug!(feed, outcome = other.label(), "cycle done"),
    }
}
