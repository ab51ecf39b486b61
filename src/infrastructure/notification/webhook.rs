//! Webhook delivery of execution events

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::domain::{ExecutionEvent, NotificationDispatcher, NotificationError};

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_TYPE_HEADER: &str = "X-Event-Type";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Endpoint settings for [`WebhookDispatcher`]
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secret: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Posts each event as JSON to a single endpoint.
///
/// `dispatch` hands delivery to a background task; failures are logged and
/// never reach the run.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    config: WebhookConfig,
    http_client: Client,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Result<Self, NotificationError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Http(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Hex HMAC-SHA256 of `payload` under `secret`
    pub fn sign(secret: &str, payload: &str) -> Result<String, NotificationError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Send one event and wait for the response status
    pub async fn deliver(&self, event: &ExecutionEvent) -> Result<u16, NotificationError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| NotificationError::Serialization(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .header(EVENT_TYPE_HEADER, event.event_type.as_str())
            .header(TIMESTAMP_HEADER, event.timestamp.to_rfc3339());

        if let Some(ref secret) = self.config.secret {
            let signature = Self::sign(secret, &payload)?;
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }

        let response = request.body(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                NotificationError::Http("Request timed out".to_string())
            } else if e.is_connect() {
                NotificationError::Http("Connection failed".to_string())
            } else {
                NotificationError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(NotificationError::Status(status));
        }

        Ok(status)
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, event: ExecutionEvent) {
        let dispatcher = self.clone();

        tokio::spawn(async move {
            match dispatcher.deliver(&event).await {
                Ok(status) => debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    run_id = %event.run_id,
                    status = status,
                    "Webhook delivered"
                ),
                Err(e) => warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    run_id = %event.run_id,
                    error = %e,
                    "Webhook delivery failed"
                ),
            }
        });
    }
}
