//! Workflow executor port

use async_trait::async_trait;

use super::entity::Workflow;
use super::error::WorkflowError;
use crate::domain::device::DeviceSession;
use crate::domain::run::{CancellationFlag, WorkflowRun};

/// Drives one pending run through its stages against an open device session.
///
/// Command, match and rollback failures are captured in the returned run.
/// An `Err` means the run could not be persisted.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    async fn execute(
        &self,
        workflow: &Workflow,
        run: WorkflowRun,
        session: &mut dyn DeviceSession,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowRun, WorkflowError>;
}
