//! # Push Delegate Notifier
//!
//! Delivers exchange state-change notifications to the holder-supplied
//! push delegate. Delivery is fire-and-forget: the HTTP POST runs on a
//! spawned task, outcomes are logged, and the state transition that
//! triggered it never waits on or rolls back over delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use credo_exchange::{Exchange, PushDelegate, PushError, PushNotifier};

/// The JSON body posted to the delegate URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    exchange_id: String,
    exchange_type: &'static str,
    state: &'static str,
}

/// [`PushNotifier`] that POSTs state changes over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPushNotifier {
    http: reqwest::Client,
}

impl HttpPushNotifier {
    /// Build a notifier with a short delivery timeout.
    pub fn new() -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PushError(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PushNotifier for HttpPushNotifier {
    async fn notify(&self, delegate: &PushDelegate, exchange: &Exchange) -> Result<(), PushError> {
        let payload = PushPayload {
            exchange_id: exchange.id.to_string(),
            exchange_type: exchange.exchange_type.as_str(),
            state: exchange.current_state().as_str(),
        };
        let request = self
            .http
            .post(&delegate.push_url)
            .bearer_auth(&delegate.push_token)
            .json(&payload);

        let push_url = delegate.push_url.clone();
        let exchange_id = exchange.id;
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%exchange_id, %push_url, "push notification delivered");
                }
                Ok(response) => {
                    warn!(%exchange_id, %push_url, status = %response.status(),
                          "push delegate rejected notification");
                }
                Err(err) => {
                    warn!(%exchange_id, %push_url, error = %err,
                          "push notification delivery failed");
                }
            }
        });

        Ok(())
    }
}
