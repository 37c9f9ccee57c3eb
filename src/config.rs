// src/config.rs
//! Application configuration: which feeds to poll, where their payloads go,
//! and the HTTP/storage knobs shared by all of them.
//!
//! Loaded once at startup from TOML; nothing here changes at runtime.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::Destination;
use crate::presets::PresetKind;
use crate::watermark::DEFAULT_STATE_PATH;

pub const ENV_CONFIG_PATH: &str = "FEED_RELAY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/feeds.toml";

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}
fn default_interval_secs() -> u64 {
    60
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_delivery_timeout_secs() -> u64 {
    10
}
fn default_delivery_attempts() -> u8 {
    1
}
fn default_user_agent() -> String {
    concat!("feed-relay/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Total attempts per webhook call; 1 = no retry.
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u8,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            delivery_attempts: default_delivery_attempts(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub preset: PresetKind,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub webhooks: Vec<WebhookEntry>,
}

/// Either a literal `url` or `url_env`, the name of an env var holding it.
/// Webhook URLs are secrets, so `url_env` is the usual choice.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub name: Option<String>,
    pub url: Option<String>,
    pub url_env: Option<String>,
}

impl WebhookEntry {
    /// `None` when the env var is unset/empty; such webhooks are skipped.
    pub fn resolve(&self, feed_id: &str, index: usize) -> Option<Destination> {
        let url = match (&self.url, &self.url_env) {
            (Some(u), _) => Some(u.trim().to_string()),
            (None, Some(var)) => std::env::var(var).ok().map(|v| v.trim().to_string()),
            (None, None) => None,
        }
        .filter(|u| !u.is_empty())?;

        let name = self
            .name
            .clone()
            .or_else(|| self.url_env.clone())
            .unwrap_or_else(|| format!("{feed_id}#{index}"));
        Some(Destination { name, url })
    }
}

impl FeedEntry {
    /// Usable destinations; unresolvable ones are logged and dropped.
    pub fn destinations(&self) -> Vec<Destination> {
        self.webhooks
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let dest = w.resolve(&self.id, i);
                if dest.is_none() {
                    tracing::warn!(
                        feed = %self.id,
                        webhook = w.name.as_deref().or(w.url_env.as_deref()).unwrap_or("?"),
                        "webhook URL not configured, skipping destination"
                    );
                }
                dest
            })
            .collect()
    }
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing feed config TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load using env var + fallback:
    /// 1) $FEED_RELAY_CONFIG
    /// 2) config/feeds.toml
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            bail!("no feeds configured");
        }
        let mut seen = BTreeSet::new();
        for f in &self.feeds {
            let id = f.id.trim();
            if id.is_empty() {
                bail!("feed with url {} has an empty id", f.url);
            }
            if !seen.insert(id) {
                bail!("duplicate feed id {id:?}");
            }
            if f.url.trim().is_empty() {
                bail!("feed {id:?} has no url");
            }
            if f.interval_secs == 0 {
                bail!("feed {id:?}: interval_secs must be > 0");
            }
            for (i, w) in f.webhooks.iter().enumerate() {
                if w.url.is_none() && w.url_env.is_none() {
                    bail!("feed {id:?} webhook #{i}: set either `url` or `url_env`");
                }
            }
        }
        if self.http.fetch_timeout_secs == 0 || self.http.delivery_timeout_secs == 0 {
            bail!("http timeouts must be > 0");
        }
        Ok(())
    }
}
