//! Execution event dispatchers

mod log_dispatcher;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

pub use log_dispatcher::LogDispatcher;
pub use webhook::{
    WebhookConfig, WebhookDispatcher, EVENT_TYPE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

use crate::config::NotificationConfig;
use crate::domain::{NotificationDispatcher, NotificationError};

/// Pick the dispatcher for the configuration: webhook when a URL is set,
/// structured logging otherwise
pub fn create_dispatcher(
    config: &NotificationConfig,
) -> Result<Arc<dyn NotificationDispatcher>, NotificationError> {
    match config.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => {
            let mut webhook = WebhookConfig::new(url)
                .with_timeout(Duration::from_secs(config.timeout_secs));
            if let Some(secret) = config.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
                webhook = webhook.with_secret(secret);
            }

            info!(url = url, signed = webhook.secret.is_some(), "Using webhook notifications");
            Ok(Arc::new(WebhookDispatcher::new(webhook)?))
        }
        None => Ok(Arc::new(LogDispatcher::new())),
    }
}
