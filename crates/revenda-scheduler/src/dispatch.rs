//! Webhook dispatch — one POST, bounded timeout, no retry.
//!
//! Campaign messages are advisory. Losing one day's batch is cheaper
//! than a retry double-sending reminders to paying clients, so every
//! failure path collapses to `false` and a log line.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Delivery seam between the engine and the wire. The engine only
/// cares whether the payload got through.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn send(&self, url: &str, payload: &Value) -> bool;
}

/// Sends dispatch payloads to the automation webhook.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Dispatch for WebhookDispatcher {
    /// POST the payload. `true` iff the endpoint answered 2xx within
    /// the timeout budget.
    async fn send(&self, url: &str, payload: &Value) -> bool {
        let result = self
            .client
            .post(url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("webhook accepted by {url}");
                true
            }
            Ok(resp) => {
                tracing::warn!("webhook {url} answered {}", resp.status());
                false
            }
            Err(e) => {
                tracing::warn!("webhook {url} failed: {e}");
                false
            }
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new(15)
    }
}
