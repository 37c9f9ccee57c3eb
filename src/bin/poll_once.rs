//! Run one poll cycle for every configured feed and exit.
//! Handy for cron-driven deployments and for checking a new feed config.

use anyhow::Context;

use feed_relay::ingest::scheduler::run_all_once;
use feed_relay::{build_context, build_jobs, telemetry, AppConfig, CycleOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::load_default().context("loading feed config")?;
    let ctx = build_context(&cfg)?;
    let jobs = build_jobs(&cfg, &ctx);

    let mut failed = 0usize;
    for (feed, outcome) in run_all_once(&jobs).await {
        match &outcome {
            CycleOutcome::Delivered {
                items,
                results,
                watermark,
            } => println!(
                "{feed}: delivered {} item(s), {}/{} webhook call(s) ok, watermark {}",
                items.len(),
                results.iter().filter(|r| r.ok).count(),
                results.len(),
                watermark.as_deref().unwrap_or("unchanged")
            ),
            CycleOutcome::Baseline { watermark } => println!(
                "{feed}: first run, baseline {}",
                watermark.as_deref().unwrap_or("not recorded")
            ),
            CycleOutcome::FetchFailed(e) => {
                failed += 1;
                println!("{feed}: fetch failed: {e}");
            }
            CycleOutcome::StorageFailed(e) => {
                failed += 1;
                println!("{feed}: storage failed: {e}");
            }
            other => println!("{feed}: {}", other.label()),
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} feed(s) failed");
    }
    Ok(())
}
