//! feed-relay — service entrypoint.
//! Loads the feed config, then polls every feed on its own timer and relays
//! new items to the configured webhooks until Ctrl-C.

use anyhow::Context;
use tracing::info;

use feed_relay::ingest::scheduler::spawn_schedulers;
use feed_relay::{build_context, build_jobs, telemetry, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; webhook URLs usually live there.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    if let Some(addr) = feed_relay::metrics::install_exporter_from_env()? {
        info!(%addr, "prometheus exporter listening");
    }

    let cfg = AppConfig::load_default().context("loading feed config")?;
    info!(
        feeds = cfg.feeds.len(),
        state = %cfg.state_path.display(),
        "config loaded"
    );

    let ctx = build_context(&cfg)?;
    let handles = spawn_schedulers(build_jobs(&cfg, &ctx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");

    for h in handles {
        h.abort();
    }
    Ok(())
}
