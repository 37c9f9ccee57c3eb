// src/error.rs
//! Error kinds for the three phases of a poll cycle: fetching a feed,
//! reading/writing watermarks, and delivering payloads.
//!
//! None of these escape a single feed's cycle; the orchestrator logs them
//! and folds them into a [`crate::pipeline::CycleOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Source unreachable or unparsable. The cycle is aborted without touching
/// the watermark and the next trigger retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse feed from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("fetching {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
}

/// Watermark read/write failure. Distinct from "no watermark yet", which is
/// `Ok(None)` on the store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not a valid watermark map: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("encoding watermark map: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Single destination failure. Isolated to that delivery and recorded in its
/// [`crate::notify::DeliveryResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("webhook answered with HTTP {0}")]
    Status(u16),

    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook did not answer in time")]
    Timeout,

    #[error("payload could not be encoded: {0}")]
    Encode(String),
}

impl DeliveryError {
    /// Short label used as a metrics/log value.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Status(_) => "status",
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Timeout => "timeout",
            DeliveryError::Encode(_) => "encode",
        }
    }
}
