//! Execution notifications
//!
//! Each run emits exactly one `execution_started` and one terminal event.
//! Delivery is fire-and-forget: a dispatcher failure never affects the run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::device::DeviceId;
use crate::domain::run::{RunId, RunStatus, StepResult, WorkflowRun};
use crate::domain::workflow::{Stage, WorkflowId};

/// Types of events emitted for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
}

impl ExecutionEventType {
    /// Returns all available event types
    pub fn all() -> Vec<Self> {
        vec![
            Self::ExecutionStarted,
            Self::ExecutionCompleted,
            Self::ExecutionFailed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ExecutionFailed => "execution_failed",
        }
    }

    /// Terminal event for a finished run; `None` while the run is still going
    pub fn terminal_for(status: RunStatus) -> Option<Self> {
        match status {
            RunStatus::Completed => Some(Self::ExecutionCompleted),
            RunStatus::Failed | RunStatus::RolledBack | RunStatus::Cancelled => {
                Some(Self::ExecutionFailed)
            }
            RunStatus::Pending | RunStatus::Running | RunStatus::RollingBack => None,
        }
    }
}

impl std::fmt::Display for ExecutionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event payload, a snapshot of the run at the moment of the transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub event_id: String,
    pub event_type: ExecutionEventType,
    pub timestamp: DateTime<Utc>,
    pub workflow_id: WorkflowId,
    pub device_id: DeviceId,
    pub run_id: RunId,
    pub status: RunStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub steps: Vec<StepResult>,
}

impl ExecutionEvent {
    pub fn from_run(event_type: ExecutionEventType, run: &WorkflowRun) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            workflow_id: run.workflow_id().clone(),
            device_id: run.device_id().clone(),
            run_id: run.id().clone(),
            status: run.status(),
            current_stage: run.current_stage(),
            started_at: run.started_at(),
            completed_at: run.completed_at(),
            duration_seconds: run.duration_seconds(),
            error_message: run.error_message(),
            steps: run.steps().to_vec(),
        }
    }
}

/// Delivery errors; reported by dispatchers, never surfaced to a run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Endpoint returned status {0}")]
    Status(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid signing key: {0}")]
    Signing(String),
}

/// Receives run lifecycle events.
///
/// `dispatch` must return promptly; slow delivery belongs on a background task.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + std::fmt::Debug {
    async fn dispatch(&self, event: ExecutionEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_event_type_names() {
        let names: Vec<&str> = ExecutionEventType::all().iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["execution_started", "execution_completed", "execution_failed"]
        );
    }

    #[test]
    fn test_terminal_event_mapping() {
        assert_eq!(
            ExecutionEventType::terminal_for(RunStatus::Completed),
            Some(ExecutionEventType::ExecutionCompleted)
        );
        for status in [RunStatus::Failed, RunStatus::RolledBack, RunStatus::Cancelled] {
            assert_eq!(
                ExecutionEventType::terminal_for(status),
                Some(ExecutionEventType::ExecutionFailed)
            );
        }
        assert_eq!(ExecutionEventType::terminal_for(RunStatus::RollingBack), None);
    }

    #[test]
    fn test_event_from_run() {
        let mut run = WorkflowRun::new(
            WorkflowId::new("vlan-change").unwrap(),
            DeviceId::new("sw-01"),
            BTreeMap::new(),
        );
        run.mark_running(Stage::PreCheck).unwrap();

        let event = ExecutionEvent::from_run(ExecutionEventType::ExecutionStarted, &run);
        assert_eq!(event.run_id, *run.id());
        assert_eq!(event.status, RunStatus::Running);
        assert_eq!(event.current_stage, Some(Stage::PreCheck));
        assert!(event.completed_at.is_none());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "execution_started");
        assert_eq!(value["workflow_id"], "vlan-change");
        assert!(value.get("duration_seconds").is_none());
    }
}
