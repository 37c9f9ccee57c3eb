// src/presets/zssk.rs
//! ZSSK (Slovak railways) disruption toots → Discord embeds, one per train.
//!
//! The toots are loosely structured text: a train line such as
//! `Os 3305 (Nitra - Leopoldov)` followed by delay, reason and info lines.
//! Lines before the first train apply to every train that lacks its own.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

use super::with_destinations;
use crate::feed::{Destination, FeedConfig, RenderFn};
use crate::ingest::RawItem;

const ALERT_ROLE_ID: &str = "1437202276392501369";
const FOOTER: &str = "Mastodon RSS Feed";
/// Discord accepts at most 10 embeds per message.
const MAX_EMBEDS: usize = 10;

const COLOR_CANCELLED: u32 = 0xFF0000;
const COLOR_DELAYED: u32 = 0xFFA500;
const COLOR_INFO: u32 = 0x1DA1F2;

/// Matched case-insensitively against the toot text.
const TRAIN_KEYWORDS: &[&str] = &[
    "vlak",
    "mešká",
    "odrieknutý",
    "Os ",
    "R ",
    "Ex ",
    "IC ",
    "EC ",
    "REX ",
    "upozorňujeme cestujúcich",
    "reštauračný vozeň",
    "výluka",
];

/// Column headers some toots carry; never content.
const HEADER_LINES: &[&str] = &["Vlak", "Meškanie", "Dôvod"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toot {
    pub description: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Train {
    pub train: String,
    pub delay: String,
    pub reason: String,
    pub other: String,
    pub cancelled: bool,
    pub delayed: bool,
}

fn train_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"^((?:Os|R|Ex|EC|REX|RR|IC)\s+\d+\s*\([^)]+\))").expect("valid regex")
    })
}

fn minutes_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*minút").expect("valid regex"))
}

fn is_delay_text(s: &str) -> bool {
    s.contains("mešká") || s.contains("predpoklad") || s.contains("odrieknutý")
}

fn is_reason_text(s: &str) -> bool {
    s.contains("mešká pre") || s.contains("V dôsledku")
}

/// Keep only toots that talk about trains.
pub fn normalize(item: &RawItem) -> Option<Toot> {
    let text = item.content_snippet.as_deref()?;
    let lower = text.to_lowercase();
    let relevant = TRAIN_KEYWORDS
        .iter()
        .any(|k| lower.contains(&k.to_lowercase()));
    if !relevant {
        return None;
    }
    Some(Toot {
        description: text.to_string(),
        link: item.link.clone(),
        published_at: item.published_at,
    })
}

impl Train {
    fn set_delay(&mut self, line: &str) {
        self.delay = line.to_string();
        if line.contains("odrieknutý") {
            self.cancelled = true;
        } else {
            self.delayed = true;
        }
    }

    fn is_info(&self) -> bool {
        !self.cancelled && !self.delayed
    }
}

/// Split a toot into trains, folding shared reason/info lines into every
/// train that has none of its own.
pub fn parse_trains(description: &str) -> Vec<Train> {
    let mut trains = Vec::new();
    let mut current: Option<Train> = None;
    let mut common_reason = String::new();
    let mut common_info = String::new();

    let lines = description
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !HEADER_LINES.contains(l));

    for line in lines {
        if let Some(m) = train_re().find(line) {
            trains.extend(current.take());
            let mut train = Train {
                train: m.as_str().trim().to_string(),
                ..Default::default()
            };
            let rest = line[m.end()..].trim();
            if !rest.is_empty() {
                if is_delay_text(rest) {
                    train.set_delay(rest);
                } else {
                    train.other = rest.to_string();
                }
            }
            current = Some(train);
        } else if let Some(train) = current.as_mut() {
            if is_delay_text(line) && train.delay.is_empty() {
                train.set_delay(line);
            } else if is_reason_text(line) && train.reason.is_empty() {
                train.reason = line.to_string();
            } else if train.other.is_empty() {
                train.other = line.to_string();
            }
        } else if is_reason_text(line) {
            common_reason = line.to_string();
        } else {
            common_info = line.to_string();
        }
    }
    trains.extend(current);

    for train in &mut trains {
        if train.reason.is_empty() && !common_reason.is_empty() {
            train.reason = common_reason.clone();
        }
        if train.other.is_empty() && !common_info.is_empty() {
            train.other = common_info.clone();
        }
    }
    trains
}

/// Bold the first "<n> minút" in a delay line.
fn emphasize_minutes(delay: &str) -> String {
    minutes_re().replacen(delay, 1, "**$1 minút**").into_owned()
}

fn embed(train: &Train, toot: &Toot) -> Value {
    let (color, title) = if train.cancelled {
        (COLOR_CANCELLED, "🔴 Zrušený vlak ZSSK")
    } else if train.delayed {
        (COLOR_DELAYED, "🟠 Meškanie ZSSK")
    } else {
        debug_assert!(train.is_info());
        (COLOR_INFO, "🔔 Informácia ZSSK")
    };

    let mut fields = vec![json!({
        "name": "🚂 Vlak",
        "value": format!("**{}**", train.train),
        "inline": false,
    })];
    if !train.delay.is_empty() {
        fields.push(json!({
            "name": "⏰ Meškanie",
            "value": emphasize_minutes(&train.delay),
            "inline": false,
        }));
    }
    if !train.reason.is_empty() {
        fields.push(json!({
            "name": "📋 Dôvod",
            "value": format!("*{}*", train.reason),
            "inline": false,
        }));
    }
    if !train.other.is_empty() {
        fields.push(json!({
            "name": "ℹ️ Informácia",
            "value": format!("> {}", train.other),
            "inline": false,
        }));
    }

    let mut embed = json!({
        "title": title,
        "color": color,
        "fields": fields,
        "footer": { "text": FOOTER },
    });
    if let Some(link) = &toot.link {
        embed["url"] = json!(link);
    }
    if let Some(ts) = toot.published_at {
        embed["timestamp"] = json!(ts.to_rfc3339());
    }
    embed
}

/// `None` when the toot names no train.
pub fn render(toot: &Toot) -> Option<Value> {
    let trains = parse_trains(&toot.description);
    if trains.is_empty() {
        return None;
    }

    let embeds: Vec<Value> = trains
        .iter()
        .take(MAX_EMBEDS)
        .map(|t| embed(t, toot))
        .collect();

    Some(json!({
        "embeds": embeds,
        "content": format!("<@&{ALERT_ROLE_ID}>"),
        "allowed_mentions": { "roles": [ALERT_ROLE_ID] },
    }))
}

pub fn feed(id: &str, source: &str, destinations: &[Destination]) -> FeedConfig<Toot> {
    let render: RenderFn<Toot> = Arc::new(render);
    with_destinations(FeedConfig::new(id, source, normalize), destinations, render)
}
