//! Log-only event sink

use async_trait::async_trait;
use tracing::info;

use crate::domain::{ExecutionEvent, NotificationDispatcher};

/// Writes one structured log line per event
#[derive(Debug, Clone, Default)]
pub struct LogDispatcher;

impl LogDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, event: ExecutionEvent) {
        info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            run_id = %event.run_id,
            workflow_id = %event.workflow_id,
            device_id = %event.device_id,
            status = %event.status,
            steps = event.steps.len(),
            error = event.error_message.as_deref().unwrap_or(""),
            "Execution event"
        );
    }
}
