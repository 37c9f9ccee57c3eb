// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "feed_relay=info,warn";

/// Install the global subscriber.
///   - filter from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
///   - `LOG_FORMAT=json` switches to one JSON object per line
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
