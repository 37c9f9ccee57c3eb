// src/presets/mod.rs
//! Per-feed payload shapes. Each preset pairs a normalizer with a renderer
//! and is picked by name from the config file.

pub mod dennikn;
pub mod generic;
pub mod zssk;

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FeedEntry;
use crate::feed::{Destination, FeedConfig, RenderFn, WebhookConfig};
use crate::pipeline::{FeedPoller, PollContext, PollJob};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    #[default]
    Generic,
    Dennikn,
    Zssk,
}

/// Build the poll job for one configured feed.
pub fn build_job(entry: &FeedEntry, ctx: PollContext) -> Arc<dyn PollJob> {
    let destinations = entry.destinations();
    let interval = Duration::from_secs(entry.interval_secs);

    match entry.preset {
        PresetKind::Generic => Arc::new(FeedPoller::new(
            generic::feed(&entry.id, &entry.url, &destinations).every(interval),
            ctx,
        )),
        PresetKind::Dennikn => Arc::new(FeedPoller::new(
            dennikn::feed(&entry.id, &entry.url, &destinations).every(interval),
            ctx,
        )),
        PresetKind::Zssk => Arc::new(FeedPoller::new(
            zssk::feed(&entry.id, &entry.url, &destinations).every(interval),
            ctx,
        )),
    }
}

/// Same renderer for every destination.
pub(crate) fn with_destinations<T>(
    mut feed: FeedConfig<T>,
    destinations: &[Destination],
    render: RenderFn<T>,
) -> FeedConfig<T> {
    feed.webhooks = destinations
        .iter()
        .map(|d| WebhookConfig {
            destination: d.clone(),
            render: Arc::clone(&render),
        })
        .collect();
    feed
}

/// Cut to `max` characters, ending in "..." when something was cut.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Lowercase and drop Central European diacritics, for matching category
/// names regardless of how the feed spells them.
pub(crate) fn fold_key(s: &str) -> String {
    s.trim().to_lowercase().chars().map(strip_accent).collect()
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'ä' | 'à' | 'â' | 'ã' | 'å' | 'ą' => 'a',
        'č' | 'ć' | 'ç' => 'c',
        'ď' => 'd',
        'é' | 'ě' | 'è' | 'ê' | 'ë' | 'ę' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ĺ' | 'ľ' | 'ł' => 'l',
        'ň' | 'ń' | 'ñ' => 'n',
        'ó' | 'ô' | 'ö' | 'ò' | 'õ' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'š' | 'ś' => 's',
        'ť' => 't',
        'ú' | 'ů' | 'ü' | 'ù' | 'û' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        other => other,
    }
}
