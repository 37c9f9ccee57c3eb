// src/notify/webhook.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::WebhookSender;
use crate::error::DeliveryError;

/// Plain JSON-over-HTTP webhook (Discord, Slack, anything that takes a POST).
#[derive(Clone)]
pub struct ReqwestWebhook {
    client: Client,
    timeout: Duration,
}

impl ReqwestWebhook {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl WebhookSender for ReqwestWebhook {
    async fn send(&self, url: &str, body: &Value) -> Result<(), DeliveryError> {
        // `.json()` sets Content-Type: application/json
        let rsp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else if e.is_builder() {
                    // bad URL or body that failed to serialize
                    DeliveryError::Encode(e.to_string())
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}
