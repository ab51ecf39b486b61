//! Run repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entity::{RunId, RunStatus, WorkflowRun};
use crate::domain::error::DomainError;
use crate::domain::workflow::WorkflowId;

#[cfg(test)]
use mockall::automock;

/// Persistence for execution records.
///
/// The orchestrator calls `update` after every transition and step so a
/// crashed process still leaves partial progress behind.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Get a run by ID
    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError>;

    /// Store a new run
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError>;

    /// Replace an existing run
    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, DomainError>;

    /// List runs by status
    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<WorkflowRun>, DomainError>;

    /// List runs of one workflow, oldest first
    async fn list_by_workflow(&self, workflow_id: &WorkflowId)
        -> Result<Vec<WorkflowRun>, DomainError>;

    /// Delete terminal runs created before the given timestamp
    async fn delete_terminal_older_than(&self, before: DateTime<Utc>) -> Result<u64, DomainError>;
}
