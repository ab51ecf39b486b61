//! NetOps workflow runner
//!
//! Interprets staged remediation workflows against a single network device:
//! - `pre_check`, `implementation` and `post_check` stages run in order
//! - the first failure switches to the `rollback` stage
//! - output matching, variable capture and one level of conditional branching
//! - every step is persisted and lifecycle events are dispatched

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{ExecutionRequest, RunStatus, Workflow, WorkflowError, WorkflowRun};
pub use infrastructure::services::{create_run_service, RunHandle, RunService};
