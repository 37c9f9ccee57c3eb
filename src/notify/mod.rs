// src/notify/mod.rs
//! Delivery of rendered payloads to webhook destinations.
//!
//! Payloads for the same destination go out one after another in the order
//! given; different destinations run concurrently. The dispatcher waits for
//! every delivery to settle and never retries beyond the configured attempts.

pub mod webhook;

pub use webhook::ReqwestWebhook;

use async_trait::async_trait;
use futures::future::join_all;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::DeliveryError;
use crate::feed::Destination;

/// A rendered body bound to its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub destination: Destination,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub destination: Destination,
    pub ok: bool,
    pub error: Option<DeliveryError>,
}

impl DeliveryResult {
    fn from_outcome(destination: Destination, outcome: Result<(), DeliveryError>) -> Self {
        match outcome {
            Ok(()) => Self {
                destination,
                ok: true,
                error: None,
            },
            Err(e) => Self {
                destination,
                ok: false,
                error: Some(e),
            },
        }
    }
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST `body` as JSON to `url`. Success means a 2xx answer.
    async fn send(&self, url: &str, body: &Value) -> Result<(), DeliveryError>;
}

#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<dyn WebhookSender>,
    timeout: Duration,
    max_attempts: u8,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn WebhookSender>) -> Self {
        Self {
            sender,
            timeout: Duration::from_secs(10),
            max_attempts: 1,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per payload, clamped to 1..=5. 1 means no retry.
    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.clamp(1, 5);
        self
    }

    /// Send every payload; one result per payload.
    ///
    /// Results are grouped by destination URL (first-seen order), and within
    /// a URL they follow the input order.
    pub async fn dispatch(&self, payloads: Vec<Payload>) -> Vec<DeliveryResult> {
        // One queue per URL; every body carries its own destination.
        let mut queues: Vec<(String, Vec<(Destination, Value)>)> = Vec::new();
        for p in payloads {
            match queues.iter_mut().find(|(url, _)| *url == p.destination.url) {
                Some((_, queue)) => queue.push((p.destination, p.body)),
                None => queues.push((p.destination.url.clone(), vec![(p.destination, p.body)])),
            }
        }

        let lanes = queues
            .into_iter()
            .map(|(_, queue)| self.drain_queue(queue));

        join_all(lanes).await.into_iter().flatten().collect()
    }

    async fn drain_queue(&self, queue: Vec<(Destination, Value)>) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(queue.len());
        for (dest, body) in queue {
            let outcome = self.deliver(&dest, &body).await;
            match &outcome {
                Ok(()) => {
                    tracing::debug!(destination = %dest.name, "webhook delivered");
                    counter!("webhook_deliveries_total", "destination" => dest.name.clone(), "outcome" => "ok")
                        .increment(1);
                }
                Err(e) => {
                    tracing::warn!(destination = %dest.name, error = %e, "webhook delivery failed");
                    counter!("webhook_deliveries_total", "destination" => dest.name.clone(), "outcome" => e.kind())
                        .increment(1);
                }
            }
            results.push(DeliveryResult::from_outcome(dest, outcome));
        }
        results
    }

    async fn deliver(&self, dest: &Destination, body: &Value) -> Result<(), DeliveryError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = match tokio::time::timeout(self.timeout, self.sender.send(&dest.url, body)).await
            {
                Ok(r) => r,
                Err(_) => Err(DeliveryError::Timeout),
            };

            match res {
                Err(e) if attempt < self.max_attempts => {
                    tracing::debug!(destination = %dest.name, attempt, error = %e, "retrying webhook");
                    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                }
                other => return other,
            }
        }
    }
}
