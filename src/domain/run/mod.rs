//! Workflow run domain module

mod cancellation;
mod entity;
pub mod repository;
mod request;
mod step;

pub use cancellation::CancellationFlag;
pub use entity::{RunId, RunStatus, WorkflowRun};
pub use repository::RunRepository;
pub use request::ExecutionRequest;
pub use step::{BranchArm, BranchInfo, ErrorKind, RunFailure, StepError, StepResult};

#[cfg(test)]
pub use repository::MockRunRepository;
