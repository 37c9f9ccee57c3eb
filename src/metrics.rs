// src/metrics.rs
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_cycles_total", "Poll cycles by feed and outcome.");
        describe_counter!(
            "feed_new_items_total",
            "Items detected as new and handed to rendering."
        );
        describe_counter!(
            "feed_fetch_errors_total",
            "Feed fetch/parse failures and timeouts."
        );
        describe_counter!("feed_items_fetched_total", "Items parsed from fetched feeds.");
        describe_histogram!("feed_fetch_ms", "Feed fetch + parse time in milliseconds.");
        describe_counter!(
            "webhook_deliveries_total",
            "Webhook deliveries by destination and outcome."
        );
        describe_counter!("watermark_writes_total", "Successful watermark writes.");
    });
}

/// Install the Prometheus exporter with its own HTTP listener when
/// `$METRICS_ADDR` is set. Without it the `metrics` macros stay no-ops.
pub fn install_exporter_from_env() -> anyhow::Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {ENV_METRICS_ADDR} {raw:?}: {e}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus: install exporter: {e}"))?;

    ensure_metrics_described();
    Ok(Some(addr))
}
