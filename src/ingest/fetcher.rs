// src/ingest/fetcher.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use std::time::Duration;

use super::parser::parse_feed;
use super::types::{FeedFetcher, RawItem};
use crate::error::FetchError;

/// Fetches feeds over HTTP and parses them with [`parse_feed`].
#[derive(Clone)]
pub struct HttpFeedFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<RawItem>, FetchError> {
        let t0 = std::time::Instant::now();

        let rsp = self
            .client
            .get(source)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| http_error(source, e, self.timeout))?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: source.to_string(),
                status: status.as_u16(),
            });
        }

        let body = rsp
            .text()
            .await
            .map_err(|e| http_error(source, e, self.timeout))?;

        let items = parse_feed(&body).map_err(|reason| FetchError::Parse {
            url: source.to_string(),
            reason,
        })?;

        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("feed_items_fetched_total").increment(items.len() as u64);
        Ok(items)
    }
}

fn http_error(url: &str, e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: e,
        }
    }
}
